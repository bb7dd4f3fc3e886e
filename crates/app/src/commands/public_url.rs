//! `asamblea public-url`: shareable self-service voting link

use asamblea_core::Config;
use chrono::Utc;
use uuid::Uuid;

use crate::platform;
use crate::render;

pub async fn run(
    config: &Config,
    group: Uuid,
    voting: Uuid,
    hours: Option<u32>,
    copy: bool,
) -> anyhow::Result<()> {
    let hours = hours.unwrap_or(config.public_url.expires_in_hours);
    if hours == 0 {
        anyhow::bail!("--hours must be positive");
    }

    let api = super::api(config)?;
    let scope = api.scope(group, voting);
    let url = api
        .public_url(&scope, hours)
        .await
        .map_err(super::surface)?;

    println!("{}", render::public_url(&url, Utc::now()));

    if copy {
        if platform::copy_to_clipboard(url.as_str()) {
            eprintln!("copied to clipboard");
        } else {
            eprintln!("copy failed; select the link above");
        }
    }
    Ok(())
}
