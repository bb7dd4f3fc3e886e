//! Live vote events pushed by the backend stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::sanitize;

/// A vote was cast (`vote-cast`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCastEvent {
    /// Vote id; doubles as the event id for deduplication
    pub id: Uuid,
    pub voting_id: Uuid,
    pub property_unit_id: Uuid,
    #[serde(default)]
    pub voting_option_id: Option<Uuid>,
    #[serde(default)]
    pub option_text: Option<String>,
    #[serde(default)]
    pub option_code: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub voted_at: Option<DateTime<Utc>>,
}

impl VoteCastEvent {
    /// Whether the option text and color carry real data
    pub fn has_complete_option(&self) -> bool {
        sanitize::is_present(self.option_text.as_deref())
            && sanitize::is_present(self.color.as_deref())
    }
}

/// A vote was retracted (`vote-deleted`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteDeletedEvent {
    /// Id of the retracted vote
    pub id: Uuid,
    pub property_unit_id: Uuid,
}

/// Either kind of vote event, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum VoteEvent {
    Cast(VoteCastEvent),
    Deleted(VoteDeletedEvent),
}

impl VoteEvent {
    pub fn property_unit_id(&self) -> Uuid {
        match self {
            VoteEvent::Cast(e) => e.property_unit_id,
            VoteEvent::Deleted(e) => e.property_unit_id,
        }
    }
}

/// Accept RFC 3339 timestamps; anything unparseable becomes `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}
