//! Asamblea Core Library
//!
//! Voting models, live reconciliation, quorum statistics and configuration
//! for condominium assemblies.

pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod reconcile;
pub mod sanitize;
pub mod statistics;
pub mod unvoted;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;
pub use reconcile::{CastOutcome, DeleteOutcome, EventLog, ReconciliationEngine, VoteCounters};
pub use statistics::{
    check_render_readiness, compute_statistics, ConfigurationError, MissingColor,
    OptionStatistics, VotingStatistics,
};
pub use unvoted::UnvotedUnit;
