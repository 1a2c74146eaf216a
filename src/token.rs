//! Bearer token acquisition
//!
//! Exchanges the profile's username/password for a short-lived bearer token
//! using HTTP basic auth against `{host}/v3/identity/token`. One attempt per
//! call; tokens are never cached.

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::endpoints::Connection;
use crate::error::NodeError;

/// Opaque bearer credential, valid for one pipeline run
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Identity-endpoint client
#[derive(Debug, Clone)]
pub struct TokenFetcher {
    client: reqwest::Client,
}

impl TokenFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Request a token.
    ///
    /// A 200 response without a `token` field yields `Ok(None)`; the
    /// dispatcher turns that into [`NodeError::InvalidTokenResponse`].
    #[instrument(skip_all, fields(host = %conn.host()))]
    pub async fn fetch(&self, conn: &Connection) -> Result<Option<BearerToken>, NodeError> {
        let url = conn.token_url()?;

        let response = self
            .client
            .get(url)
            .basic_auth(&conn.username, Some(&conn.password))
            .send()
            .await
            .map_err(NodeError::TokenTransportError)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, "Access token request rejected");
            return Err(NodeError::TokenRequestFailed {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(NodeError::TokenTransportError)?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| NodeError::MalformedTokenResponse {
                details: format!("body is not a token document: {}", e),
            })?;

        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .map(BearerToken);
        debug!(received = token.is_some(), "Access token response received");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let token = BearerToken::new("abc");
        assert_eq!(format!("{:?}", token), "BearerToken(<redacted>)");
        assert_eq!(token.as_str(), "abc");
    }

    #[test]
    fn token_response_tolerates_missing_field() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(parsed.token.is_none());
    }
}
