//! Voting and voting option models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// How a voting tallies its options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VotingType {
    #[default]
    Simple,
    Multiple,
    Weighted,
    Majority,
}

impl VotingType {
    pub fn display_name(&self) -> &'static str {
        match self {
            VotingType::Simple => "Simple",
            VotingType::Multiple => "Multiple choice",
            VotingType::Weighted => "Weighted",
            VotingType::Majority => "Majority",
        }
    }
}

/// A single motion within a voting group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voting {
    pub id: Uuid,
    pub voting_group_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub voting_type: VotingType,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub allows_abstention: bool,
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
    /// Required approval in percent, within (0, 100]
    pub required_percentage: f64,
}

impl Voting {
    /// Validate the required-approval percentage
    pub fn validate(&self) -> Result<()> {
        if !(self.required_percentage > 0.0 && self.required_percentage <= 100.0) {
            return Err(Error::InvalidVoting(format!(
                "required percentage {} for voting {} is outside (0, 100]",
                self.required_percentage, self.id
            )));
        }
        if self.title.trim().is_empty() {
            return Err(Error::InvalidVoting(format!("voting {} has no title", self.id)));
        }
        Ok(())
    }
}

/// One selectable answer to a voting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingOption {
    pub id: Uuid,
    pub voting_id: Uuid,
    pub option_text: String,
    /// Short code, unique within the voting
    pub option_code: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Display color as `#RRGGBB`; required for live results
    #[serde(default)]
    pub color: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Sort options into display order (stable for equal orders)
pub fn sort_options(options: &mut [VotingOption]) {
    options.sort_by_key(|o| o.display_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_voting(required: f64) -> Voting {
        Voting {
            id: Uuid::new_v4(),
            voting_group_id: Uuid::new_v4(),
            title: "Aprobación de presupuesto".to_string(),
            description: None,
            voting_type: VotingType::Simple,
            is_secret: false,
            allows_abstention: true,
            is_active: true,
            display_order: 1,
            required_percentage: required,
        }
    }

    #[test]
    fn test_required_percentage_bounds() {
        assert!(make_voting(51.0).validate().is_ok());
        assert!(make_voting(100.0).validate().is_ok());
        assert!(make_voting(0.0).validate().is_err());
        assert!(make_voting(100.5).validate().is_err());
    }

    #[test]
    fn test_voting_type_wire_names() {
        let parsed: VotingType = serde_json::from_str("\"weighted\"").unwrap();
        assert_eq!(parsed, VotingType::Weighted);
        assert_eq!(
            serde_json::to_string(&VotingType::Majority).unwrap(),
            "\"majority\""
        );
    }

    #[test]
    fn test_option_defaults() {
        let json = r#"{
            "id": "6f1c1c36-6c56-4e3a-9a85-7a1f5b0d3c11",
            "voting_id": "0b7e6d2e-8f0a-4d0e-b1f4-5a8d7c6e9f01",
            "option_text": "Sí",
            "option_code": "SI"
        }"#;
        let option: VotingOption = serde_json::from_str(json).unwrap();
        assert!(option.is_active);
        assert!(option.color.is_none());
        assert_eq!(option.display_order, 0);
    }
}
