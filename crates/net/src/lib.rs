//! Asamblea Network Library
//!
//! Talks to the voting backend over HTTP.
//!
//! # Architecture
//!
//! - **Api**: REST calls (snapshot, unvoted units, cast/retract, public URL)
//! - **Stream**: server-sent vote events with reconnect and backoff
//! - **Protocol**: JSON wire types and error message normalization
//!
//! # Usage
//!
//! ```ignore
//! let api = ApiClient::from_config(&config)?;
//! let scope = api.scope(group_id, voting_id);
//! let snapshot = api.load_snapshot(&scope).await?;
//!
//! let mut stream = EventStream::connect(api, scope, &config.stream);
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         StreamEvent::VoteCast(cast) => { /* reconcile */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod api;
pub mod error;
pub mod protocol;
pub mod public_url;
pub mod sse;
pub mod stream;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, VotingApi, VotingScope};
pub use error::{Error, ErrorKind, Result};
pub use protocol::CastVoteRequest;
pub use public_url::PublicVotingUrl;
pub use stream::{ConnectionState, EventStream, StreamEvent};
