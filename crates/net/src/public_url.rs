//! Time-limited public voting links
//!
//! The backend issues a URL (24h by default) that residents open from a QR
//! code to vote without an operator. Only http(s) links are accepted.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;

use crate::error::{Error, Result};

/// A validated public voting URL and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicVotingUrl {
    url: Url,
    pub expires_at: DateTime<Utc>,
}

impl PublicVotingUrl {
    /// Parse and validate a URL returned by the backend
    pub fn new(raw: impl AsRef<str>, expires_at: DateTime<Utc>) -> Result<Self> {
        let raw = raw.as_ref().trim();
        let url = Url::parse(raw)
            .map_err(|e| Error::Protocol(format!("Invalid public URL '{}': {}", raw, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Protocol(format!(
                    "Invalid public URL: unsupported scheme '{}'",
                    other
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(Error::Protocol("Invalid public URL: missing host".into()));
        }

        Ok(Self { url, expires_at })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.expires_at - now;
        (left > Duration::zero()).then_some(left)
    }
}

impl fmt::Display for PublicVotingUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
