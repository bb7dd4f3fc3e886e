//! Voting group model - an assembly session holding one or more votings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named assembly with its own date window and quorum policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingGroup {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default)]
    pub requires_quorum: bool,
    /// Quorum threshold in percent (0-100)
    #[serde(default)]
    pub quorum_percentage: f64,
    pub created_by: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

impl VotingGroup {
    /// Groups are never hard-deleted; deleting only deactivates
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Whether the group is active and `now` lies inside its date window
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.starts_at && now <= self.ends_at
    }
}
