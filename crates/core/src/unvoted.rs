//! Client-side narrowing of the server's unvoted-unit list
//!
//! The server answer is the source of truth. These helpers only drop units
//! the live stream has already seen vote, which shrinks (but cannot close)
//! the window in which an operator picks a unit that just voted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::VoteEvent;

/// A unit the server reports as not having voted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnvotedUnit {
    pub property_unit_id: Uuid,
    pub unit_number: String,
    #[serde(default)]
    pub resident_name: Option<String>,
    #[serde(default)]
    pub coefficient: f64,
}

impl UnvotedUnit {
    /// "101 - Ana Pérez", or just the unit number
    pub fn display_label(&self) -> String {
        match self.resident_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{} - {}", self.unit_number, name),
            _ => self.unit_number.clone(),
        }
    }
}

/// Case-insensitive unit-number substring match; an empty filter matches all
pub fn matches_filter(unit_number: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim) {
        None | Some("") => true,
        Some(f) => unit_number.to_lowercase().contains(&f.to_lowercase()),
    }
}

/// Drop every unit the local state already marks as voted
pub fn exclude_voted(units: Vec<UnvotedUnit>, voted: &HashSet<Uuid>) -> Vec<UnvotedUnit> {
    units
        .into_iter()
        .filter(|u| !voted.contains(&u.property_unit_id))
        .collect()
}

/// Update the voted set with one streamed event.
///
/// A retraction frees the unit again. Casts without usable option data are
/// still counted: the backend accepted the vote even if the payload was
/// mangled in transit.
pub fn record_streamed_vote(voted: &mut HashSet<Uuid>, event: &VoteEvent) {
    match event {
        VoteEvent::Cast(cast) => {
            voted.insert(cast.property_unit_id);
        }
        VoteEvent::Deleted(deleted) => {
            voted.remove(&deleted.property_unit_id);
        }
    }
}

/// Fold an ordered stream of events into the set of units currently voted
pub fn voted_ids_from_events(events: &[VoteEvent]) -> HashSet<Uuid> {
    let mut voted = HashSet::new();
    for event in events {
        record_streamed_vote(&mut voted, event);
    }
    voted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VoteCastEvent, VoteDeletedEvent};
    use crate::reconcile::ReconciliationEngine;
    use crate::models::{PropertyUnit, UnitVotingState, Voting, VotingSnapshot, VotingType};
    use chrono::Utc;

    fn make_unvoted(number: &str) -> UnvotedUnit {
        UnvotedUnit {
            property_unit_id: Uuid::new_v4(),
            unit_number: number.to_string(),
            resident_name: Some("Ana Pérez".to_string()),
            coefficient: 10.0,
        }
    }

    fn cast_for(voting_id: Uuid, unit_id: Uuid) -> VoteCastEvent {
        VoteCastEvent {
            id: Uuid::new_v4(),
            voting_id,
            property_unit_id: unit_id,
            voting_option_id: Some(Uuid::new_v4()),
            option_text: Some("Sí".to_string()),
            option_code: Some("SI".to_string()),
            color: Some("#22c55e".to_string()),
            voted_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_filter_matching() {
        assert!(matches_filter("Torre A-101", None));
        assert!(matches_filter("Torre A-101", Some("  ")));
        assert!(matches_filter("Torre A-101", Some("a-10")));
        assert!(!matches_filter("Torre A-101", Some("B-")));
    }

    #[test]
    fn test_streamed_cast_excludes_unit() {
        let server = vec![make_unvoted("101"), make_unvoted("102")];
        let voting_id = Uuid::new_v4();
        let events = vec![VoteEvent::Cast(cast_for(voting_id, server[0].property_unit_id))];

        let voted = voted_ids_from_events(&events);
        let remaining = exclude_voted(server.clone(), &voted);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].unit_number, "102");
    }

    #[test]
    fn test_retraction_frees_unit() {
        let unit = make_unvoted("101");
        let cast = cast_for(Uuid::new_v4(), unit.property_unit_id);
        let events = vec![
            VoteEvent::Cast(cast.clone()),
            VoteEvent::Deleted(VoteDeletedEvent {
                id: cast.id,
                property_unit_id: unit.property_unit_id,
            }),
        ];

        let voted = voted_ids_from_events(&events);
        assert!(exclude_voted(vec![unit], &voted).len() == 1);
    }

    #[test]
    fn test_engine_state_excludes_unit() {
        let voting = Voting {
            id: Uuid::new_v4(),
            voting_group_id: Uuid::new_v4(),
            title: "Presupuesto".to_string(),
            description: None,
            voting_type: VotingType::Simple,
            is_secret: false,
            allows_abstention: false,
            is_active: true,
            display_order: 1,
            required_percentage: 50.0,
        };
        let unit = PropertyUnit {
            id: Uuid::new_v4(),
            unit_number: "101".to_string(),
            coefficient: 100.0,
            resident: None,
        };
        let mut engine = ReconciliationEngine::new();
        engine.load_snapshot(&VotingSnapshot {
            voting: voting.clone(),
            options: Vec::new(),
            units: vec![UnitVotingState::pending(&unit)],
            fetched_at: Utc::now(),
        });
        engine.apply_cast_event(&cast_for(voting.id, unit.id));

        let server = vec![UnvotedUnit {
            property_unit_id: unit.id,
            unit_number: "101".to_string(),
            resident_name: None,
            coefficient: 100.0,
        }];
        assert!(exclude_voted(server, &engine.voted_unit_ids()).is_empty());
    }

    #[test]
    fn test_display_label() {
        let mut unit = make_unvoted("101");
        assert_eq!(unit.display_label(), "101 - Ana Pérez");
        unit.resident_name = None;
        assert_eq!(unit.display_label(), "101");
    }
}
