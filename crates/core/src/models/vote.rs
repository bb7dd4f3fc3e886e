//! Vote model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vote cast by a unit. At most one live vote exists per (voting, unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub voting_id: Uuid,
    pub property_unit_id: Uuid,
    pub voting_option_id: Uuid,
    pub voted_at: DateTime<Utc>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}
