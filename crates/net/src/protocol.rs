//! Backend wire types
//!
//! REST payloads are JSON, optionally wrapped in `{"data": ...}`. Stream
//! frames carry JSON in their `data` field and are named `vote-cast` or
//! `vote-deleted`.

use asamblea_core::{
    PropertyUnit, UnitVotingState, UnvotedUnit, VoteCastEvent, VoteDeletedEvent, VoteEvent,
    Voting, VotingOption, VotingSnapshot,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sse::SseFrame;

/// SSE event name for a cast vote
pub const EVENT_VOTE_CAST: &str = "vote-cast";

/// SSE event name for a retracted vote
pub const EVENT_VOTE_DELETED: &str = "vote-deleted";

/// Response body that may or may not be wrapped in `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

/// Decode a JSON body, unwrapping a `data` envelope if present
pub fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
    Ok(match envelope {
        Envelope::Wrapped { data } => data,
        Envelope::Bare(value) => value,
    })
}

/// Resident as nested in unit rows
#[derive(Debug, Clone, Deserialize)]
struct WireResident {
    #[serde(default)]
    name: Option<String>,
}

/// One unit row of the voting details endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UnitStatusRow {
    #[serde(alias = "id")]
    pub property_unit_id: Uuid,
    pub unit_number: String,
    #[serde(default)]
    pub coefficient: f64,
    #[serde(default)]
    resident: Option<WireResident>,
    #[serde(default)]
    resident_name: Option<String>,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub vote_id: Option<Uuid>,
    #[serde(default)]
    pub option_text: Option<String>,
    #[serde(default)]
    pub option_code: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub voted_at: Option<DateTime<Utc>>,
}

impl From<UnitStatusRow> for UnitVotingState {
    fn from(row: UnitStatusRow) -> Self {
        let resident_name = row
            .resident_name
            .or_else(|| row.resident.and_then(|r| r.name))
            .filter(|n| !n.trim().is_empty());
        let mut state = UnitVotingState::pending(&PropertyUnit {
            id: row.property_unit_id,
            unit_number: row.unit_number,
            coefficient: row.coefficient,
            resident: None,
        });
        state.resident_name = resident_name;
        state.has_voted = row.has_voted;
        state.vote_id = row.vote_id;
        state.option_text = row.option_text;
        state.option_code = row.option_code;
        state.color = row.color;
        state.voted_at = row.voted_at;
        state
    }
}

/// `GET .../details` response
#[derive(Debug, Clone, Deserialize)]
pub struct VotingDetailsResponse {
    pub voting: Voting,
    #[serde(default)]
    pub options: Vec<VotingOption>,
    #[serde(default, alias = "property_units")]
    pub units: Vec<UnitStatusRow>,
}

impl VotingDetailsResponse {
    pub fn into_snapshot(self) -> VotingSnapshot {
        let mut options = self.options;
        asamblea_core::sort_options(&mut options);
        VotingSnapshot {
            voting: self.voting,
            options,
            units: self.units.into_iter().map(UnitVotingState::from).collect(),
            fetched_at: Utc::now(),
        }
    }
}

/// One row of `GET .../unvoted-units`
#[derive(Debug, Clone, Deserialize)]
pub struct UnvotedUnitRow {
    #[serde(alias = "id")]
    pub property_unit_id: Uuid,
    pub unit_number: String,
    #[serde(default)]
    resident_name: Option<String>,
    #[serde(default)]
    resident: Option<WireResident>,
    #[serde(default)]
    pub coefficient: f64,
}

impl From<UnvotedUnitRow> for UnvotedUnit {
    fn from(row: UnvotedUnitRow) -> Self {
        UnvotedUnit {
            property_unit_id: row.property_unit_id,
            unit_number: row.unit_number,
            resident_name: row
                .resident_name
                .or_else(|| row.resident.and_then(|r| r.name)),
            coefficient: row.coefficient,
        }
    }
}

/// `POST .../votes` body
#[derive(Debug, Clone, Serialize)]
pub struct CastVoteRequest {
    pub voting_option_id: Uuid,
    pub property_unit_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// `GET .../public-url` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Error body returned by the backend on rejected requests
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

/// Extract a human message from an error body and tidy it up.
///
/// Falls back to the raw body, and to `fallback` when the body is empty.
pub fn normalize_error_message(body: &[u8], fallback: &str) -> String {
    let raw = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => [parsed.message, parsed.error, parsed.detail, parsed.errors]
            .into_iter()
            .flatten()
            .map(flatten_message)
            .find(|m| !m.trim().is_empty())
            .unwrap_or_default(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => fallback.to_string(),
    }
}

fn flatten_message(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(flatten_message)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(field, v)| format!("{}: {}", field, flatten_message(v)))
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Messages carried by the live stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Vote(VoteEvent),
    /// Heartbeats and unknown event names
    Ignored,
}

impl StreamMessage {
    /// Interpret a decoded SSE frame
    pub fn from_frame(frame: &SseFrame) -> Result<Self, serde_json::Error> {
        match frame.event.as_str() {
            EVENT_VOTE_CAST => {
                let event: VoteCastEvent = serde_json::from_str(&frame.data)?;
                Ok(StreamMessage::Vote(VoteEvent::Cast(event)))
            }
            EVENT_VOTE_DELETED => {
                let event: VoteDeletedEvent = serde_json::from_str(&frame.data)?;
                Ok(StreamMessage::Vote(VoteEvent::Deleted(event)))
            }
            _ => Ok(StreamMessage::Ignored),
        }
    }
}
