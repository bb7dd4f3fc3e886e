//! Terminal rendering
//!
//! Everything here returns strings so the command layer decides where
//! output goes.

use asamblea_core::{ConfigurationError, OptionStatistics, UnvotedUnit, VotingStatistics};
use asamblea_net::{ConnectionState, ErrorKind, PublicVotingUrl};
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

const BAR_WIDTH: usize = 30;

/// Parse `#RRGGBB`
fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Colored block for an option's configured color
pub fn swatch(color: Option<&str>) -> ColoredString {
    match color.and_then(parse_hex) {
        Some((r, g, b)) => "■".truecolor(r, g, b),
        None => "□".dimmed(),
    }
}

fn bar(percentage: f64, color: Option<&str>) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    let body = "█".repeat(filled);
    let rest = "░".repeat(BAR_WIDTH - filled);
    let body = match color.and_then(parse_hex) {
        Some((r, g, b)) => body.truecolor(r, g, b).to_string(),
        None => body.dimmed().to_string(),
    };
    format!("{}{}", body, rest.dimmed())
}

fn option_line(option: &OptionStatistics) -> String {
    format!(
        "  {} {:<20} {} {:>6.2}%  {:>4} units  coef {:>7.3}",
        swatch(option.color.as_deref()),
        option.option_text,
        bar(option.percentage_by_coefficient, option.color.as_deref()),
        option.percentage_by_coefficient,
        option.vote_count,
        option.coefficient_sum,
    )
}

/// Full results table for one voting
pub fn statistics(title: &str, stats: &VotingStatistics) -> String {
    let mut out = Vec::new();
    out.push(title.bold().to_string());

    for option in &stats.options {
        out.push(option_line(option));
    }
    out.push(option_line(&stats.not_voted));
    if stats.unrecognized.vote_count > 0 {
        out.push(
            format!(
                "  {} {} units voted for unknown options (coef {:.3})",
                "!".yellow().bold(),
                stats.unrecognized.vote_count,
                stats.unrecognized.coefficient_sum
            )
            .yellow()
            .to_string(),
        );
    }

    out.push(format!(
        "  {}/{} voted, {} pending",
        stats.units_voted, stats.total_units, stats.units_pending
    ));

    let quorum = format!(
        "participation {:.2}% / required {:.2}%",
        stats.participation_percentage, stats.required_percentage
    );
    out.push(if stats.quorum_reached {
        format!("  {} {}", "QUORUM REACHED".green().bold(), quorum)
    } else {
        format!("  {} {}", "NO QUORUM".red().bold(), quorum)
    });

    if let Some(leader) = stats.leading_option() {
        out.push(format!(
            "  leading: {} {}",
            swatch(leader.color.as_deref()),
            leader.option_text.bold()
        ));
    }

    out.join("\n")
}

/// Blocking panel shown instead of results when options cannot be drawn
pub fn configuration_error(error: &ConfigurationError) -> String {
    let mut out = vec![
        "┌ Voting configuration error".red().bold().to_string(),
        "│ Results are hidden until every option has a valid #RRGGBB color.".to_string(),
    ];
    match error {
        ConfigurationError::NoOptions => out.push("│ The voting has no active options.".to_string()),
        ConfigurationError::MissingColors(missing) => {
            for m in missing {
                let configured = match &m.configured {
                    Some(raw) => format!("configured as {:?}", raw),
                    None => "not configured".to_string(),
                };
                out.push(format!(
                    "│   {} ({}): color {}",
                    m.option_code.bold(),
                    m.option_text,
                    configured
                ));
            }
        }
    }
    out.push("└".red().to_string());
    out.join("\n")
}

/// One-line banner for a surfaced error
pub fn error_banner(kind: ErrorKind, message: &str) -> String {
    match kind {
        ErrorKind::Transport => format!(
            "{} {} (press l to retry)",
            "⚠ connection problem:".yellow().bold(),
            message
        ),
        ErrorKind::Auth => format!(
            "{} sign in again and restart",
            "Session expired:".red().bold()
        ),
        ErrorKind::BusinessRule => format!("{} {}", "Rejected:".red().bold(), message),
        ErrorKind::DataIntegrity => format!("{} {}", "Invalid data:".red().bold(), message),
    }
}

pub fn stream_state(state: ConnectionState) -> String {
    let label = state.label();
    let dot = match state {
        ConnectionState::Connected => "●".green(),
        ConnectionState::Connecting => "●".yellow(),
        ConnectionState::Error => "●".red(),
        ConnectionState::Closed => "●".dimmed(),
    };
    format!("{} {}", dot, label)
}

pub fn snapshot_loaded(title: &str, total_units: usize, fetched_at: DateTime<Utc>) -> String {
    format!(
        "{} {} ({} units, as of {})",
        "snapshot".cyan(),
        title.bold(),
        total_units,
        fetched_at.format("%H:%M:%S")
    )
}

/// Numbered list of units still able to vote
pub fn unvoted(units: &[UnvotedUnit]) -> String {
    if units.is_empty() {
        return "No pending units".dimmed().to_string();
    }
    units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            format!(
                "{:>3}. {}  coef {:.3}  {}",
                i + 1,
                unit.display_label(),
                unit.coefficient,
                unit.property_unit_id.to_string().dimmed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn public_url(url: &PublicVotingUrl, now: DateTime<Utc>) -> String {
    let expiry = match url.remaining_at(now) {
        Some(left) => format!(
            "expires {} (in {}h {:02}m)",
            url.expires_at.format("%Y-%m-%d %H:%M UTC"),
            left.num_hours(),
            left.num_minutes() % 60
        ),
        None => "expired".red().to_string(),
    };
    format!("{}\n{}", url.as_str().bold().underline(), expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asamblea_core::MissingColor;

    fn plain() {
        colored::control::set_override(false);
    }

    fn option(code: &str, text: &str, color: Option<&str>, count: usize, pct: f64) -> OptionStatistics {
        OptionStatistics {
            option_code: code.to_string(),
            option_text: text.to_string(),
            color: color.map(str::to_string),
            vote_count: count,
            coefficient_sum: pct,
            percentage_by_coefficient: pct,
            percentage_of_voted: 0.0,
        }
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#22c55e"), Some((0x22, 0xc5, 0x5e)));
        assert_eq!(parse_hex("22c55e"), None);
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_statistics_table() {
        plain();
        let stats = VotingStatistics {
            options: vec![
                option("SI", "Sí", Some("#22c55e"), 2, 75.0),
                option("NO", "No", Some("#ef4444"), 0, 0.0),
            ],
            not_voted: option("NOT_VOTED", "Not Voted", None, 1, 25.0),
            unrecognized: option("UNRECOGNIZED", "Unrecognized", None, 0, 0.0),
            total_units: 3,
            units_voted: 2,
            units_pending: 1,
            required_percentage: 60.0,
            participation_percentage: 75.0,
            quorum_reached: true,
        };

        let out = statistics("Reforma", &stats);
        assert!(out.contains("Sí"));
        assert!(out.contains("75.00%"));
        assert!(out.contains("Not Voted"));
        assert!(out.contains("QUORUM REACHED"));
        assert!(out.contains("leading"));
        assert!(!out.contains("unknown options"));
    }

    #[test]
    fn test_configuration_panel_names_options() {
        plain();
        let error = ConfigurationError::MissingColors(vec![MissingColor {
            option_code: "ABS".to_string(),
            option_text: "Abstención".to_string(),
            configured: Some("undefined".to_string()),
        }]);
        let out = configuration_error(&error);
        assert!(out.contains("ABS (Abstención)"));
        assert!(out.contains("\"undefined\""));
    }

    #[test]
    fn test_banners() {
        plain();
        assert!(error_banner(ErrorKind::Auth, "401").contains("Session expired"));
        assert!(error_banner(ErrorKind::BusinessRule, "Unit already voted")
            .ends_with("Unit already voted"));
        assert!(error_banner(ErrorKind::Transport, "refused").contains("retry"));
    }
}
