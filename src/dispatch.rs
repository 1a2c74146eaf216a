//! Scoring dispatch
//!
//! Resolves the mode to a target URL, POSTs the parameter bag with bearer
//! auth, and maps the response. Non-200 responses are decoded as a service
//! error envelope when possible:
//!
//! ```json
//! {"errors": [{"message": "..."}]}
//! ```

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::endpoints::Connection;
use crate::error::NodeError;
use crate::mode::Mode;
use crate::params::ParamBag;
use crate::token::BearerToken;

/// Scoring-endpoint client
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Run the remote operation selected by `mode`.
    ///
    /// Unknown modes fail before any request is made.
    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn dispatch(
        &self,
        mode: &Mode,
        conn: &Connection,
        token: Option<&BearerToken>,
        params: &ParamBag,
    ) -> Result<Value, NodeError> {
        let url = target_url(mode, conn, params)?;
        let token = token.ok_or_else(|| NodeError::InvalidTokenResponse {
            details: "identity response carried no 'token' field".to_string(),
        })?;
        self.post(url, token, params).await
    }

    async fn post(
        &self,
        url: Url,
        token: &BearerToken,
        params: &ParamBag,
    ) -> Result<Value, NodeError> {
        debug!(url = %url, has_fields = params.fields.is_some(), "Sending scoring request");

        let response = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/json")
            .json(&params.scoring_request())
            .send()
            .await
            .map_err(NodeError::DispatchTransportError)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(NodeError::DispatchTransportError)?;

        if status != StatusCode::OK {
            let err = remote_error(status, &body);
            warn!(status = %status, error = %err, "Scoring request rejected");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| NodeError::InvalidScoringResponse {
            details: e.to_string(),
        })
    }
}

/// Mode → endpoint. Exhaustive so new modes must pick a target here.
fn target_url(mode: &Mode, conn: &Connection, params: &ParamBag) -> Result<Url, NodeError> {
    match mode {
        Mode::RunFunction => {
            let deployment_id = params.deployment_id.as_deref().ok_or_else(|| {
                NodeError::MissingDeploymentId {
                    mode: mode.to_string(),
                }
            })?;
            conn.online_deployment_url(deployment_id)
        }
        Mode::Unknown(name) => Err(NodeError::UnknownMode { mode: name.clone() }),
    }
}

/// Decode a non-200 body into the most specific error available
fn remote_error(status: StatusCode, body: &str) -> NodeError {
    let status = status.as_u16();
    let Ok(raw) = serde_json::from_str::<Value>(body) else {
        return NodeError::RemoteErrorUnstructured { status };
    };

    let message = raw
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    match message {
        Some(message) => NodeError::RemoteError {
            status,
            message,
            raw,
        },
        None => NodeError::RemoteErrorUnstructured { status },
    }
}
