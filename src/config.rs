//! Node file parsing
//!
//! A node file describes one `ai-function` node: its mode configuration and
//! the connection profile used to reach the scoring service.
//!
//! ```yaml
//! node:
//!   mode: runFunction
//!   deploymentId: 4f1e...
//! connection:
//!   host: https://us-south.ml.cloud.ibm.com
//!   accessKey: ...
//!   instanceId: ...
//!   username: ...
//!   password: ...
//! ```
//!
//! Blank connection fields are filled from `WML_*` environment variables.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::NodeError;
use crate::node::NODE_TYPE;

/// Environment variables consulted for blank connection fields
pub const ENV_HOST: &str = "WML_HOST";
pub const ENV_ACCESS_KEY: &str = "WML_ACCESS_KEY";
pub const ENV_INSTANCE_ID: &str = "WML_INSTANCE_ID";
pub const ENV_USERNAME: &str = "WML_USERNAME";
pub const ENV_PASSWORD: &str = "WML_PASSWORD";

/// Returns the value unless it is empty. Whitespace counts as a value.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Mode configuration for the node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Node type; must be `ai-function` when set
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
    /// Label used in logs
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "wml-mode")]
    pub mode: Option<String>,
    #[serde(default, alias = "deploymentid")]
    pub deployment_id: Option<String>,
}

impl NodeConfig {
    pub fn display_name(&self) -> &str {
        non_blank(&self.name).unwrap_or(NODE_TYPE)
    }
}

/// Connection profile as configured (fields may be missing)
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, alias = "accesskey")]
    pub access_key: Option<String>,
    #[serde(default, alias = "instanceid")]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ConnectionProfile {
    /// Fill blank fields using `lookup` (normally the process environment)
    pub fn fill_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let slots = [
            (&mut self.host, ENV_HOST),
            (&mut self.access_key, ENV_ACCESS_KEY),
            (&mut self.instance_id, ENV_INSTANCE_ID),
            (&mut self.username, ENV_USERNAME),
            (&mut self.password, ENV_PASSWORD),
        ];
        for (slot, var) in slots {
            if non_blank(slot).is_none() {
                if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                    *slot = Some(value);
                }
            }
        }
    }

    /// True when no field holds a value
    pub fn is_empty(&self) -> bool {
        [
            &self.host,
            &self.access_key,
            &self.instance_id,
            &self.username,
            &self.password,
        ]
        .into_iter()
        .all(|v| non_blank(v).is_none())
    }
}

/// Secrets never reach logs
impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("instance_id", &self.instance_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Node file: `node:` + optional `connection:`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeFile {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub connection: Option<ConnectionProfile>,
}

impl NodeFile {
    /// Parse from YAML string and check the node type
    pub fn from_yaml(yaml: &str) -> Result<Self, NodeError> {
        let file: NodeFile = serde_yaml::from_str(yaml)?;
        file.check_type()?;
        Ok(file)
    }

    /// Read and parse a node file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let yaml = std::fs::read_to_string(path)?;
        let mut file = Self::from_yaml(&yaml)?;
        file.fill_connection_from(|var| std::env::var(var).ok());
        Ok(file)
    }

    /// Apply overrides to the connection profile, creating it when the
    /// lookup alone supplies something.
    pub fn fill_connection_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = self.connection.is_some();
        let mut profile = self.connection.take().unwrap_or_default();
        profile.fill_from(lookup);
        self.connection = if profile.is_empty() && !configured {
            None
        } else {
            Some(profile)
        };
    }

    fn check_type(&self) -> Result<(), NodeError> {
        match non_blank(&self.node.node_type) {
            None => Ok(()),
            Some(t) if t == NODE_TYPE => Ok(()),
            Some(other) => Err(NodeError::UnsupportedNodeType {
                node_type: other.to_string(),
            }),
        }
    }
}
