//! Property unit model (voting-relevant subset)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resident associated with a property unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: Uuid,
    pub name: String,
}

/// A unit of the horizontal property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyUnit {
    pub id: Uuid,
    pub unit_number: String,
    /// Participation coefficient; coefficients of a business sum to 100
    pub coefficient: f64,
    #[serde(default)]
    pub resident: Option<Resident>,
}

impl PropertyUnit {
    pub fn resident_name(&self) -> Option<&str> {
        self.resident.as_ref().map(|r| r.name.as_str())
    }
}
