//! Subcommand implementations

pub mod live;
pub mod pick;
pub mod public_url;
pub mod replay;
pub mod summary;
pub mod unvoted;
pub mod votes;

use asamblea_core::Config;
use asamblea_net::ApiClient;

use crate::render;

/// Backend client from configuration
pub fn api(config: &Config) -> anyhow::Result<ApiClient> {
    Ok(ApiClient::from_config(config)?)
}

/// Turn a backend error into the message shown to the operator.
///
/// Business-rule rejections keep the backend's wording.
pub fn surface(error: asamblea_net::Error) -> anyhow::Error {
    let message = match &error {
        asamblea_net::Error::Rejected(message) => message.clone(),
        other => other.to_string(),
    };
    anyhow::anyhow!(render::error_banner(error.kind(), &message))
}
