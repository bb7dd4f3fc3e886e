//! REST client for the voting backend
//!
//! Every request carries the bearer token and the business scope header.
//! Snapshot and unvoted-unit queries are never cached.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use asamblea_core::{Config, UnvotedUnit, Vote, Voting, VotingSnapshot};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{
    decode_body, normalize_error_message, CastVoteRequest, PublicUrlResponse, UnvotedUnitRow,
    VotingDetailsResponse,
};
use crate::public_url::PublicVotingUrl;

/// Header carrying the tenant scope
pub const BUSINESS_HEADER: &str = "X-Business-Id";

/// Identifies one voting inside a business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VotingScope {
    pub business_id: Uuid,
    pub voting_group_id: Uuid,
    pub voting_id: Uuid,
}

impl VotingScope {
    pub fn new(business_id: Uuid, voting_group_id: Uuid, voting_id: Uuid) -> Self {
        Self {
            business_id,
            voting_group_id,
            voting_id,
        }
    }

    fn voting_path(&self) -> String {
        format!(
            "/voting-groups/{}/votings/{}",
            self.voting_group_id, self.voting_id
        )
    }
}

/// Read side of the backend used by a live session
pub trait VotingApi: Send + Sync + 'static {
    /// Fetch the authoritative per-unit voting status
    fn load_snapshot(
        &self,
        scope: &VotingScope,
    ) -> impl Future<Output = Result<VotingSnapshot>> + Send;

    /// Fetch units that have not voted, optionally filtered by unit number
    fn unvoted_units(
        &self,
        scope: &VotingScope,
        unit_number: Option<&str>,
    ) -> impl Future<Output = Result<Vec<UnvotedUnit>>> + Send;
}

/// HTTP client for the voting endpoints
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    business_id: Uuid,
    token: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("business_id", &self.business_id)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client. A missing token is reported on first use.
    pub fn new(
        base_url: impl Into<String>,
        business_id: Uuid,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid backend URL '{}': {}", base_url, e)))?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("asamblea/", env!("CARGO_PKG_VERSION")));
        // Local backends are never reached through a proxy
        if is_loopback(&parsed) {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url,
            business_id,
            token,
            timeout,
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.backend.base_url.clone(),
            config.business_id()?,
            config.auth.resolve_token(),
            config.backend.timeout(),
        )
    }

    pub fn business_id(&self) -> Uuid {
        self.business_id
    }

    /// Scope a voting to this client's business
    pub fn scope(&self, voting_group_id: Uuid, voting_id: Uuid) -> VotingScope {
        VotingScope::new(self.business_id, voting_group_id, voting_id)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(Error::SessionExpired)?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header(BUSINESS_HEADER, self.business_id.to_string()))
    }

    /// Send a request and map non-success statuses to errors
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let request = self
            .request(Method::GET, path)?
            .query(query)
            .timeout(self.timeout);
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(decode_body(&bytes)?)
    }

    /// `GET /voting-groups/{g}/votings`
    #[instrument(skip(self))]
    pub async fn list_votings(&self, voting_group_id: Uuid) -> Result<Vec<Voting>> {
        let mut votings: Vec<Voting> = self
            .get_json(&format!("/voting-groups/{}/votings", voting_group_id), &[])
            .await?;
        votings.sort_by_key(|v| v.display_order);
        Ok(votings)
    }

    /// `POST .../votes`; business-rule refusals come back as `Error::Rejected`
    #[instrument(skip(self, request), fields(unit = %request.property_unit_id))]
    pub async fn cast_vote(&self, scope: &VotingScope, request: &CastVoteRequest) -> Result<Vote> {
        let path = format!("{}/votes", scope.voting_path());
        let builder = self
            .request(Method::POST, &path)?
            .json(request)
            .timeout(self.timeout);
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        let vote: Vote = decode_body(&bytes)?;
        debug!(vote_id = %vote.id, "Vote cast");
        Ok(vote)
    }

    /// `DELETE /votes/{id}`
    #[instrument(skip(self))]
    pub async fn delete_vote(&self, vote_id: Uuid) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &format!("/votes/{}", vote_id))?
            .timeout(self.timeout);
        self.send(builder).await?;
        debug!(vote_id = %vote_id, "Vote retracted");
        Ok(())
    }

    /// `GET .../public-url`, valid for `expires_in_hours`
    #[instrument(skip(self))]
    pub async fn public_url(
        &self,
        scope: &VotingScope,
        expires_in_hours: u32,
    ) -> Result<PublicVotingUrl> {
        let hours = expires_in_hours.to_string();
        let response: PublicUrlResponse = self
            .get_json(
                &format!("{}/public-url", scope.voting_path()),
                &[("expires_in_hours", hours.as_str())],
            )
            .await?;
        PublicVotingUrl::new(response.url, response.expires_at)
    }

    /// Open the server-push connection for a voting.
    ///
    /// No overall timeout applies; the body stays open until either side
    /// closes it.
    pub(crate) async fn open_event_stream(&self, scope: &VotingScope) -> Result<Response> {
        let builder = self
            .request(Method::GET, &format!("{}/events", scope.voting_path()))?
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache");
        self.send(builder).await
    }
}

impl VotingApi for ApiClient {
    #[instrument(skip(self), fields(voting_id = %scope.voting_id))]
    async fn load_snapshot(&self, scope: &VotingScope) -> Result<VotingSnapshot> {
        let details: VotingDetailsResponse = self
            .get_json(&format!("{}/details", scope.voting_path()), &[])
            .await?;
        if details.voting.id != scope.voting_id {
            warn!(returned = %details.voting.id, "Snapshot returned a different voting");
            return Err(Error::Protocol(format!(
                "snapshot for voting {} requested, {} returned",
                scope.voting_id, details.voting.id
            )));
        }
        Ok(details.into_snapshot())
    }

    #[instrument(skip(self), fields(voting_id = %scope.voting_id))]
    async fn unvoted_units(
        &self,
        scope: &VotingScope,
        unit_number: Option<&str>,
    ) -> Result<Vec<UnvotedUnit>> {
        let filter = unit_number.map(str::trim).unwrap_or("");
        let rows: Vec<UnvotedUnitRow> = self
            .get_json(
                &format!("{}/unvoted-units", scope.voting_path()),
                &[("unit_number", filter)],
            )
            .await?;
        Ok(rows.into_iter().map(UnvotedUnit::from).collect())
    }
}

fn is_loopback(url: &reqwest::Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

/// Map an unsuccessful status and its body to an error
fn status_error(status: StatusCode, body: &[u8]) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::SessionExpired,
        s if s.is_server_error()
            || s == StatusCode::TOO_MANY_REQUESTS
            || s == StatusCode::REQUEST_TIMEOUT =>
        {
            Error::Http {
                status: s.as_u16(),
                message: normalize_error_message(body, s.canonical_reason().unwrap_or("Server error")),
            }
        }
        s if s.is_client_error() => Error::Rejected(normalize_error_message(
            body,
            s.canonical_reason().unwrap_or("Request rejected"),
        )),
        s => Error::Http {
            status: s.as_u16(),
            message: normalize_error_message(body, "Unexpected response"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{http_response, TestServer};

    const VOTING_ID: &str = "9a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

    fn client_for(server: &TestServer, token: Option<&str>) -> (ApiClient, VotingScope) {
        let client = ApiClient::new(
            server.base_url(),
            Uuid::new_v4(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap();
        let scope = client.scope(Uuid::new_v4(), Uuid::parse_str(VOTING_ID).unwrap());
        (client, scope)
    }

    fn details_body() -> String {
        format!(
            r##"{{"voting": {{"id": "{}", "voting_group_id": "0b7e6d2e-8f0a-4d0e-b1f4-5a8d7c6e9f01",
                "title": "Presupuesto", "is_active": true, "required_percentage": 60}},
              "options": [{{"id": "6f1c1c36-6c56-4e3a-9a85-7a1f5b0d3c11", "voting_id": "{}",
                "option_text": "Sí", "option_code": "SI", "color": "#22c55e"}}],
              "units": [{{"property_unit_id": "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
                "unit_number": "101", "coefficient": 100.0, "has_voted": false}}]}}"##,
            VOTING_ID, VOTING_ID
        )
    }

    #[tokio::test]
    async fn test_load_snapshot() {
        let server = TestServer::start(vec![http_response(200, "application/json", &details_body())]).await;
        let (client, scope) = client_for(&server, Some("secret"));

        let snapshot = client.load_snapshot(&scope).await.unwrap();
        assert_eq!(snapshot.units.len(), 1);
        assert_eq!(snapshot.options[0].option_code, "SI");

        let request = server.requests().await.remove(0);
        assert!(request.starts_with(&format!("GET /voting-groups/{}/votings/{}/details", scope.voting_group_id, VOTING_ID)));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.to_lowercase().contains(&format!("x-business-id: {}", scope.business_id)));
    }

    #[tokio::test]
    async fn test_unvoted_units_passes_filter() {
        let body = r#"{"data": [{"id": "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f", "unit_number": "101",
            "resident": {"name": "Ana"}, "coefficient": 12.0}]}"#;
        let server = TestServer::start(vec![http_response(200, "application/json", body)]).await;
        let (client, scope) = client_for(&server, Some("secret"));

        let units = client.unvoted_units(&scope, Some("10")).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].resident_name.as_deref(), Some("Ana"));

        let request = server.requests().await.remove(0);
        assert!(request.contains("unvoted-units?unit_number=10"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_session_expired() {
        let server = TestServer::start(vec![http_response(401, "application/json", "{}")]).await;
        let (client, scope) = client_for(&server, Some("stale"));

        let err = client.load_snapshot(&scope).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
    }

    #[tokio::test]
    async fn test_missing_token_never_hits_network() {
        let server = TestServer::start(Vec::new()).await;
        let (client, scope) = client_for(&server, None);

        let err = client.unvoted_units(&scope, None).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
        assert!(server.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_business_rule_rejection_is_normalized() {
        let body = r#"{"message": "la unidad ya registró un voto en esta votación"}"#;
        let server = TestServer::start(vec![http_response(409, "application/json", body)]).await;
        let (client, scope) = client_for(&server, Some("secret"));

        let request = CastVoteRequest {
            voting_option_id: Uuid::new_v4(),
            property_unit_id: Uuid::new_v4(),
            ip_address: None,
            user_agent: Some("asamblea".to_string()),
        };
        match client.cast_vote(&scope, &request).await {
            Err(Error::Rejected(message)) => {
                assert_eq!(message, "La unidad ya registró un voto en esta votación")
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = TestServer::start(vec![http_response(503, "text/plain", "maintenance")]).await;
        let (client, scope) = client_for(&server, Some("secret"));

        let err = client.load_snapshot(&scope).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, Error::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_snapshot_for_wrong_voting_rejected() {
        let server = TestServer::start(vec![http_response(200, "application/json", &details_body())]).await;
        let (client, _) = client_for(&server, Some("secret"));
        let scope = client.scope(Uuid::new_v4(), Uuid::new_v4());

        assert!(matches!(
            client.load_snapshot(&scope).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_public_url() {
        let body = r#"{"url": "https://vote.example.com/p/Zx81", "expires_at": "2030-01-01T00:00:00Z"}"#;
        let server = TestServer::start(vec![http_response(200, "application/json", body)]).await;
        let (client, scope) = client_for(&server, Some("secret"));

        let url = client.public_url(&scope, 24).await.unwrap();
        assert_eq!(url.as_str(), "https://vote.example.com/p/Zx81");
        let request = server.requests().await.remove(0);
        assert!(request.contains("/public-url?expires_in_hours=24"));
    }

    #[test]
    fn test_loopback_detection() {
        let url = |s: &str| reqwest::Url::parse(s).unwrap();
        assert!(is_loopback(&url("http://localhost:8000/api")));
        assert!(is_loopback(&url("http://127.0.0.1:9/")));
        assert!(is_loopback(&url("http://[::1]:9/")));
        assert!(!is_loopback(&url("https://api.example.com")));
        assert!(ApiClient::new("not a url", Uuid::new_v4(), None, Duration::from_secs(1)).is_err());
    }
}
