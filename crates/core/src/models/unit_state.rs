//! Per-unit derived voting state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PropertyUnit, VoteCastEvent};
use crate::sanitize;

/// What a unit should display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Voted,
}

/// Reconciled voting view of a single unit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitVotingState {
    pub property_unit_id: Uuid,
    pub unit_number: String,
    pub coefficient: f64,
    #[serde(default)]
    pub resident_name: Option<String>,
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

impl UnitVotingState {
    /// A unit that has not voted yet
    pub fn pending(unit: &PropertyUnit) -> Self {
        Self {
            property_unit_id: unit.id,
            unit_number: unit.unit_number.clone(),
            coefficient: unit.coefficient,
            resident_name: unit.resident_name().map(str::to_string),
            has_voted: false,
            vote_id: None,
            option_text: None,
            option_code: None,
            color: None,
            voted_at: None,
        }
    }

    /// Voted with usable option text and color
    pub fn has_valid_vote(&self) -> bool {
        self.has_voted
            && sanitize::is_present(self.option_text.as_deref())
            && sanitize::is_present(self.color.as_deref())
    }

    /// Voted state with missing option data falls back to pending
    pub fn display_status(&self) -> UnitStatus {
        if self.has_valid_vote() {
            UnitStatus::Voted
        } else {
            UnitStatus::Pending
        }
    }

    /// Record a validated cast event
    pub(crate) fn record_vote(&mut self, event: &VoteCastEvent) {
        self.has_voted = true;
        self.vote_id = Some(event.id);
        self.option_text = sanitize::present(event.option_text.as_deref()).map(str::to_string);
        self.option_code = sanitize::present(event.option_code.as_deref()).map(str::to_string);
        self.color = sanitize::present(event.color.as_deref()).map(str::to_string);
        self.voted_at = Some(event.voted_at.unwrap_or_else(Utc::now));
    }

    /// Back to pending with every option field cleared
    pub(crate) fn clear_vote(&mut self) {
        self.has_voted = false;
        self.vote_id = None;
        self.option_text = None;
        self.option_code = None;
        self.color = None;
        self.voted_at = None;
    }
}
