//! Point-in-time voting status as served by the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{UnitVotingState, Voting, VotingOption};

/// Authoritative snapshot of a voting and every unit's status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingSnapshot {
    pub voting: Voting,
    #[serde(default)]
    pub options: Vec<VotingOption>,
    #[serde(default)]
    pub units: Vec<UnitVotingState>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}
