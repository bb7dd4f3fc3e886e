//! `asamblea cast` and `asamblea retract`

use anyhow::{anyhow, Context};
use asamblea_core::{Config, VotingOption};
use asamblea_net::{CastVoteRequest, VotingApi};
use colored::Colorize;
use tracing::info;
use uuid::Uuid;

/// Find an active option by code, case-insensitively
fn find_option<'a>(options: &'a [VotingOption], code: &str) -> anyhow::Result<&'a VotingOption> {
    let code = code.trim();
    let option = options
        .iter()
        .find(|o| o.option_code.eq_ignore_ascii_case(code))
        .ok_or_else(|| {
            let known = options
                .iter()
                .filter(|o| o.is_active)
                .map(|o| o.option_code.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("unknown option '{}' (available: {})", code, known)
        })?;
    if !option.is_active {
        return Err(anyhow!("option '{}' is not active", option.option_code));
    }
    Ok(option)
}

pub async fn cast(
    config: &Config,
    group: Uuid,
    voting: Uuid,
    unit: Uuid,
    option_code: &str,
) -> anyhow::Result<()> {
    let api = super::api(config)?;
    let scope = api.scope(group, voting);

    let snapshot = api
        .load_snapshot(&scope)
        .await
        .map_err(super::surface)
        .context("loading voting options")?;
    let option = find_option(&snapshot.options, option_code)?;

    let request = CastVoteRequest {
        voting_option_id: option.id,
        property_unit_id: unit,
        ip_address: None,
        user_agent: Some(concat!("asamblea-cli/", env!("CARGO_PKG_VERSION")).to_string()),
    };
    let vote = api
        .cast_vote(&scope, &request)
        .await
        .map_err(super::surface)?;

    info!(vote_id = %vote.id, option = %option.option_code, "Vote cast");
    println!(
        "{} {} for unit {} (vote {})",
        "voted".green().bold(),
        option.option_text,
        unit,
        vote.id
    );
    Ok(())
}

pub async fn retract(config: &Config, vote_id: Uuid) -> anyhow::Result<()> {
    let api = super::api(config)?;
    api.delete_vote(vote_id).await.map_err(super::surface)?;
    info!(vote_id = %vote_id, "Vote retracted");
    println!("{} vote {}", "retracted".yellow().bold(), vote_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(code: &str, active: bool) -> VotingOption {
        VotingOption {
            id: Uuid::new_v4(),
            voting_id: Uuid::new_v4(),
            option_text: code.to_string(),
            option_code: code.to_string(),
            display_order: 1,
            is_active: active,
            color: Some("#000000".to_string()),
        }
    }

    #[test]
    fn test_find_option() {
        let options = vec![option("SI", true), option("NO", true), option("OLD", false)];
        assert_eq!(find_option(&options, " si ").unwrap().option_code, "SI");

        let unknown = find_option(&options, "ABS").unwrap_err().to_string();
        assert!(unknown.contains("available: SI, NO"));

        assert!(find_option(&options, "old").is_err());
    }
}
