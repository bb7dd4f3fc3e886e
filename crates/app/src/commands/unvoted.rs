//! `asamblea unvoted`: units that can still vote

use asamblea_core::Config;
use asamblea_net::VotingApi;
use uuid::Uuid;

use crate::render;

pub async fn run(
    config: &Config,
    group: Uuid,
    voting: Uuid,
    filter: Option<&str>,
) -> anyhow::Result<()> {
    let api = super::api(config)?;
    let scope = api.scope(group, voting);
    let units = api
        .unvoted_units(&scope, filter)
        .await
        .map_err(super::surface)?;
    println!("{}", render::unvoted(&units));
    Ok(())
}
