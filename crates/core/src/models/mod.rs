//! Data models for Asamblea

mod event;
mod property_unit;
mod snapshot;
mod unit_state;
mod vote;
mod voting;
mod voting_group;

pub use event::*;
pub use property_unit::*;
pub use snapshot::*;
pub use unit_state::*;
pub use vote::*;
pub use voting::*;
pub use voting_group::*;
