//! `asamblea summary`: results of every voting in a group

use asamblea_core::{compute_statistics, Config};
use asamblea_net::VotingApi;
use colored::Colorize;
use tracing::warn;
use uuid::Uuid;

use crate::render;

pub async fn run(config: &Config, group: Uuid) -> anyhow::Result<()> {
    let api = super::api(config)?;
    let votings = api.list_votings(group).await.map_err(super::surface)?;

    if votings.is_empty() {
        println!("{}", "No votings in this group".dimmed());
        return Ok(());
    }

    for voting in votings {
        let title = format!(
            "{}. {} [{}]",
            voting.display_order,
            voting.title,
            voting.voting_type.display_name()
        );
        let scope = api.scope(group, voting.id);

        let snapshot = match api.load_snapshot(&scope).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_retryable() => {
                warn!(voting_id = %voting.id, error = %e, "Skipping voting");
                println!(
                    "{}\n{}\n",
                    title.bold(),
                    render::error_banner(e.kind(), &e.to_string())
                );
                continue;
            }
            Err(e) => return Err(super::surface(e)),
        };

        match compute_statistics(&snapshot.units, &snapshot.voting, &snapshot.options) {
            Ok(stats) => println!("{}\n", render::statistics(&title, &stats)),
            Err(e) => println!("{}\n{}\n", title.bold(), render::configuration_error(&e)),
        }
    }
    Ok(())
}
