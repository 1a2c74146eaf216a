//! Pre-flight validation stages
//!
//! Three checks run before any network traffic:
//! 1. [`check_params`] - mode selected, mode-specific config present
//! 2. [`check_payload`] - scoring input extracted from the message
//! 3. [`check_connection`] - connection profile complete
//!
//! Each returns the first problem found.

use serde_json::Value;
use tracing::debug;

use crate::config::{non_blank, ConnectionProfile, NodeConfig};
use crate::endpoints::Connection;
use crate::error::NodeError;
use crate::mode::Mode;
use crate::params::{ParamBag, ScoringPayload};

/// Resolve the mode and copy its required settings into the bag.
///
/// Unknown modes pass untouched; dispatch rejects them.
pub fn check_params(config: &NodeConfig, params: &mut ParamBag) -> Result<Mode, NodeError> {
    let mode = Mode::parse(config.mode.as_deref()).ok_or(NodeError::MissingMode)?;

    match &mode {
        Mode::RunFunction => {
            let deployment_id =
                non_blank(&config.deployment_id).ok_or_else(|| NodeError::MissingDeploymentId {
                    mode: mode.to_string(),
                })?;
            params.deployment_id = Some(deployment_id.to_string());
        }
        Mode::Unknown(name) => {
            debug!(mode = %name, "No parameter checks for mode");
        }
    }

    Ok(mode)
}

/// Extract `values`/`fields` from the message payload
pub fn check_payload(mode: &Mode, payload: &Value, params: &mut ParamBag) -> Result<(), NodeError> {
    match mode {
        Mode::RunFunction => {
            params.apply(ScoringPayload::from_payload(payload)?);
            Ok(())
        }
        Mode::Unknown(_) => Ok(()),
    }
}

/// Check the profile field by field, in a fixed order
pub fn check_connection(profile: Option<&ConnectionProfile>) -> Result<Connection, NodeError> {
    let profile = profile.ok_or(NodeError::MissingConnection)?;

    let host = non_blank(&profile.host).ok_or(NodeError::MissingHost)?;
    let access_key = non_blank(&profile.access_key).ok_or(NodeError::MissingAccessKey)?;
    let instance_id = non_blank(&profile.instance_id).ok_or(NodeError::MissingInstanceId)?;
    let username = non_blank(&profile.username).ok_or(NodeError::MissingUsername)?;
    let password = non_blank(&profile.password).ok_or(NodeError::MissingPassword)?;

    Connection::new(host, access_key, instance_id, username, password)
}
