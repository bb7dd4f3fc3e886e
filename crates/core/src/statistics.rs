//! Coefficient-weighted voting statistics
//!
//! Results are weighted by participation coefficient, not by head count.
//! Coefficients across a business are pre-normalized to sum to 100, so a
//! coefficient sum reads directly as a percentage.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::invariants::{assert_coefficient_valid, assert_unit_display_consistent};
use crate::models::{UnitStatus, UnitVotingState, Voting, VotingOption};
use crate::sanitize;

/// Tolerance for percentage comparisons
const EPSILON: f64 = 1e-9;

/// An option that cannot be rendered because its color is unusable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColor {
    pub option_code: String,
    pub option_text: String,
    /// The raw configured value, if any
    pub configured: Option<String>,
}

/// Voting configuration that blocks live results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ConfigurationError {
    #[error("voting has no active options")]
    NoOptions,
    #[error("options without a valid color: {}", format_missing(.0))]
    MissingColors(Vec<MissingColor>),
}

fn format_missing(missing: &[MissingColor]) -> String {
    missing
        .iter()
        .map(|m| format!("{} ({})", m.option_code, m.option_text))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tally for a single option (or the synthetic "Not Voted" bucket)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionStatistics {
    pub option_code: String,
    pub option_text: String,
    pub color: Option<String>,
    pub vote_count: usize,
    pub coefficient_sum: f64,
    pub percentage_by_coefficient: f64,
    pub percentage_of_voted: f64,
}

impl OptionStatistics {
    fn empty(code: &str, text: &str, color: Option<String>) -> Self {
        Self {
            option_code: code.to_string(),
            option_text: text.to_string(),
            color,
            vote_count: 0,
            coefficient_sum: 0.0,
            percentage_by_coefficient: 0.0,
            percentage_of_voted: 0.0,
        }
    }

    fn finish(&mut self, total_units: usize) {
        self.percentage_by_coefficient = self.coefficient_sum / 100.0 * 100.0;
        self.percentage_of_voted = if total_units == 0 {
            0.0
        } else {
            self.vote_count as f64 / total_units as f64 * 100.0
        };
    }
}

/// Derived results of a voting; recomputed on every change, never stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingStatistics {
    pub options: Vec<OptionStatistics>,
    pub not_voted: OptionStatistics,
    /// Voted units whose option code matches no configured option
    pub unrecognized: OptionStatistics,
    pub total_units: usize,
    pub units_voted: usize,
    pub units_pending: usize,
    pub required_percentage: f64,
    pub participation_percentage: f64,
    pub quorum_reached: bool,
}

impl VotingStatistics {
    /// Option with the largest coefficient sum; ties go to display order
    pub fn leading_option(&self) -> Option<&OptionStatistics> {
        self.options
            .iter()
            .filter(|o| o.vote_count > 0)
            .fold(None, |best: Option<&OptionStatistics>, o| match best {
                Some(b) if b.coefficient_sum + EPSILON >= o.coefficient_sum => Some(b),
                _ => Some(o),
            })
    }

    /// Sum of every bucket's coefficient; 100 for a complete unit set
    pub fn coefficient_total(&self) -> f64 {
        self.options.iter().map(|o| o.coefficient_sum).sum::<f64>()
            + self.not_voted.coefficient_sum
            + self.unrecognized.coefficient_sum
    }
}

impl fmt::Display for VotingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} units voted, participation {:.2}% (required {:.2}%)",
            self.units_voted, self.total_units, self.participation_percentage, self.required_percentage
        )
    }
}

/// Check that every active option can be rendered.
///
/// A missing color is reported, never defaulted.
pub fn check_render_readiness(options: &[VotingOption]) -> Result<(), ConfigurationError> {
    let active: Vec<&VotingOption> = options.iter().filter(|o| o.is_active).collect();
    if active.is_empty() {
        return Err(ConfigurationError::NoOptions);
    }

    let missing: Vec<MissingColor> = active
        .iter()
        .filter(|o| {
            !sanitize::present(o.color.as_deref()).is_some_and(sanitize::is_hex_color)
        })
        .map(|o| MissingColor {
            option_code: o.option_code.clone(),
            option_text: o.option_text.clone(),
            configured: o.color.clone(),
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::MissingColors(missing))
    }
}

/// Compute statistics for the current unit states.
///
/// Refuses to produce anything when the option configuration is not
/// render-ready.
pub fn compute_statistics<'a, I>(
    units: I,
    voting: &Voting,
    options: &[VotingOption],
) -> Result<VotingStatistics, ConfigurationError>
where
    I: IntoIterator<Item = &'a UnitVotingState>,
{
    check_render_readiness(options)?;

    let mut active: Vec<&VotingOption> = options.iter().filter(|o| o.is_active).collect();
    active.sort_by_key(|o| o.display_order);

    let mut buckets: Vec<OptionStatistics> = active
        .iter()
        .map(|o| OptionStatistics::empty(&o.option_code, &o.option_text, o.color.clone()))
        .collect();
    let mut not_voted = OptionStatistics::empty("NOT_VOTED", "Not Voted", None);
    let mut unrecognized = OptionStatistics::empty("UNRECOGNIZED", "Unrecognized", None);

    let mut total_units = 0usize;
    for unit in units {
        assert_coefficient_valid(unit);
        assert_unit_display_consistent(unit);
        total_units += 1;

        let bucket = match unit.display_status() {
            UnitStatus::Pending => &mut not_voted,
            UnitStatus::Voted => {
                let code = unit.option_code.as_deref().map(str::trim);
                let text = unit.option_text.as_deref().map(str::trim);
                let position = active.iter().position(|o| match code {
                    Some(code) => o.option_code.eq_ignore_ascii_case(code),
                    None => text.is_some_and(|t| o.option_text == t),
                });
                match position {
                    Some(idx) => &mut buckets[idx],
                    None => {
                        warn!(
                            unit = %unit.unit_number,
                            option_code = ?unit.option_code,
                            "Vote for an option not configured on this voting"
                        );
                        &mut unrecognized
                    }
                }
            }
        };
        bucket.vote_count += 1;
        bucket.coefficient_sum += unit.coefficient;
    }

    for bucket in buckets.iter_mut() {
        bucket.finish(total_units);
    }
    not_voted.finish(total_units);
    unrecognized.finish(total_units);

    let units_pending = not_voted.vote_count;
    let units_voted = total_units - units_pending;

    let (participation_percentage, quorum_reached) = if total_units == 0 {
        (0.0, voting.required_percentage <= 0.0)
    } else {
        let participation = 100.0 - not_voted.percentage_by_coefficient;
        (
            participation,
            participation + EPSILON >= voting.required_percentage,
        )
    };

    Ok(VotingStatistics {
        options: buckets,
        not_voted,
        unrecognized,
        total_units,
        units_voted,
        units_pending,
        required_percentage: voting.required_percentage,
        participation_percentage,
        quorum_reached,
    })
}
