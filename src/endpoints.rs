//! Validated connection and service endpoints
//!
//! - identity: `GET {host}/v3/identity/token`
//! - scoring:  `POST {host}/v3/wml_instances/{instanceId}/deployments/{deploymentId}/online`

use std::fmt;

use url::Url;

use crate::error::NodeError;

/// Connection profile with every field present and a parsed host
#[derive(Clone)]
pub struct Connection {
    host: Url,
    pub access_key: String,
    pub instance_id: String,
    pub username: String,
    pub password: String,
}

impl Connection {
    /// Parse `host` as an absolute http(s) URL
    pub fn new(
        host: &str,
        access_key: impl Into<String>,
        instance_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, NodeError> {
        let invalid = |reason: String| NodeError::InvalidHost {
            host: host.to_string(),
            reason,
        };
        let url = Url::parse(host.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("missing host name".to_string()));
        }
        Ok(Self {
            host: url,
            access_key: access_key.into(),
            instance_id: instance_id.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    /// `{host}/v3/identity/token`
    pub fn token_url(&self) -> Result<Url, NodeError> {
        self.with_segments(&["v3", "identity", "token"])
    }

    /// `{host}/v3/wml_instances/{instanceId}/deployments/{deploymentId}/online`
    pub fn online_deployment_url(&self, deployment_id: &str) -> Result<Url, NodeError> {
        self.with_segments(&[
            "v3",
            "wml_instances",
            &self.instance_id,
            "deployments",
            deployment_id,
            "online",
        ])
    }

    fn with_segments(&self, segments: &[&str]) -> Result<Url, NodeError> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|_| NodeError::InvalidHost {
                host: self.host.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host.as_str())
            .field("instance_id", &self.instance_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
