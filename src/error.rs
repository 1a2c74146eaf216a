//! Error types with fix suggestions
//!
//! Every way a scoring run can fail is a [`NodeError`] variant. Variants are
//! grouped by the pipeline [`Stage`] that raises them and map onto the coarse
//! [`ErrorCategory`] taxonomy reported to the host.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Node file loading / client construction (before any message)
    Host,
    Params,
    Payload,
    Connection,
    Token,
    Dispatch,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Host => write!(f, "host"),
            Stage::Params => write!(f, "params"),
            Stage::Payload => write!(f, "payload"),
            Stage::Connection => write!(f, "connection"),
            Stage::Token => write!(f, "token"),
            Stage::Dispatch => write!(f, "dispatch"),
        }
    }
}

/// Coarse error taxonomy surfaced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    ConfigurationError,
    PayloadError,
    ConnectionConfigError,
    AuthError,
    DispatchError,
}

#[derive(Error, Debug)]
pub enum NodeError {
    // ─────────────────────────────────────────────────────────────
    // Host errors (WML-001 to WML-004)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-001: Node file parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("WML-002: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WML-003: Unsupported node type '{node_type}' (expected 'ai-function')")]
    UnsupportedNodeType { node_type: String },

    #[error("WML-004: Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    // ─────────────────────────────────────────────────────────────
    // Parameter errors (WML-010 to WML-011)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-010: Required mode has not been specified")]
    MissingMode,

    #[error("WML-011: No deployment ID specified for mode '{mode}'")]
    MissingDeploymentId { mode: String },

    // ─────────────────────────────────────────────────────────────
    // Payload errors (WML-020 to WML-022)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-020: Values and optional fields are required to run a prediction")]
    MissingPayload,

    #[error("WML-021: Can not run a prediction without values")]
    MissingValues,

    #[error("WML-022: Values need to be provided either as an array or as an object (got {found})")]
    InvalidPayloadShape { found: &'static str },

    // ─────────────────────────────────────────────────────────────
    // Connection profile errors (WML-030 to WML-036)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-030: No connection configuration found")]
    MissingConnection,

    #[error("WML-031: No host set in connection configuration")]
    MissingHost,

    #[error("WML-032: No access key set in connection configuration")]
    MissingAccessKey,

    #[error("WML-033: No instance ID set in connection configuration")]
    MissingInstanceId,

    #[error("WML-034: No username set in connection configuration")]
    MissingUsername,

    #[error("WML-035: No password set in connection configuration")]
    MissingPassword,

    #[error("WML-036: Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Token errors (WML-040 to WML-043)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-040: Access token error {status}")]
    TokenRequestFailed { status: u16 },

    #[error("WML-041: Access token request failed: {0}")]
    TokenTransportError(#[source] reqwest::Error),

    #[error("WML-042: Identity service returned no usable token: {details}")]
    InvalidTokenResponse { details: String },

    #[error("WML-043: Identity service returned an unreadable response: {details}")]
    MalformedTokenResponse { details: String },

    // ─────────────────────────────────────────────────────────────
    // Dispatch errors (WML-050 to WML-054)
    // ─────────────────────────────────────────────────────────────
    #[error("WML-050: Unable to process as unknown mode '{mode}' has been specified")]
    UnknownMode { mode: String },

    // Uncoded: hosts match on these texts as emitted by earlier releases
    #[error("Error {status} {message}")]
    RemoteError {
        status: u16,
        message: String,
        raw: Value,
    },

    #[error("Error performing request {status}")]
    RemoteErrorUnstructured { status: u16 },

    #[error("WML-053: Scoring request failed: {0}")]
    DispatchTransportError(#[source] reqwest::Error),

    #[error("WML-054: Scoring service returned an unreadable response: {details}")]
    InvalidScoringResponse { details: String },
}

impl NodeError {
    /// Variant name, stable across releases (used as `kind` in reports)
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::YamlParse(_) => "YamlParse",
            NodeError::Io(_) => "Io",
            NodeError::UnsupportedNodeType { .. } => "UnsupportedNodeType",
            NodeError::HttpClient(_) => "HttpClient",
            NodeError::MissingMode => "MissingMode",
            NodeError::MissingDeploymentId { .. } => "MissingDeploymentId",
            NodeError::MissingPayload => "MissingPayload",
            NodeError::MissingValues => "MissingValues",
            NodeError::InvalidPayloadShape { .. } => "InvalidPayloadShape",
            NodeError::MissingConnection => "MissingConnection",
            NodeError::MissingHost => "MissingHost",
            NodeError::MissingAccessKey => "MissingAccessKey",
            NodeError::MissingInstanceId => "MissingInstanceId",
            NodeError::MissingUsername => "MissingUsername",
            NodeError::MissingPassword => "MissingPassword",
            NodeError::InvalidHost { .. } => "InvalidHost",
            NodeError::TokenRequestFailed { .. } => "TokenRequestFailed",
            NodeError::TokenTransportError(_) => "TokenTransportError",
            NodeError::InvalidTokenResponse { .. } => "InvalidTokenResponse",
            NodeError::MalformedTokenResponse { .. } => "MalformedTokenResponse",
            NodeError::UnknownMode { .. } => "UnknownMode",
            NodeError::RemoteError { .. } => "RemoteError",
            NodeError::RemoteErrorUnstructured { .. } => "RemoteErrorUnstructured",
            NodeError::DispatchTransportError(_) => "DispatchTransportError",
            NodeError::InvalidScoringResponse { .. } => "InvalidScoringResponse",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            NodeError::YamlParse(_)
            | NodeError::Io(_)
            | NodeError::UnsupportedNodeType { .. }
            | NodeError::HttpClient(_) => Stage::Host,
            NodeError::MissingMode | NodeError::MissingDeploymentId { .. } => Stage::Params,
            NodeError::MissingPayload
            | NodeError::MissingValues
            | NodeError::InvalidPayloadShape { .. } => Stage::Payload,
            NodeError::MissingConnection
            | NodeError::MissingHost
            | NodeError::MissingAccessKey
            | NodeError::MissingInstanceId
            | NodeError::MissingUsername
            | NodeError::MissingPassword
            | NodeError::InvalidHost { .. } => Stage::Connection,
            NodeError::TokenRequestFailed { .. }
            | NodeError::TokenTransportError(_)
            | NodeError::MalformedTokenResponse { .. } => Stage::Token,
            // A null token is only detected once dispatch needs it
            NodeError::InvalidTokenResponse { .. }
            | NodeError::UnknownMode { .. }
            | NodeError::RemoteError { .. }
            | NodeError::RemoteErrorUnstructured { .. }
            | NodeError::DispatchTransportError(_)
            | NodeError::InvalidScoringResponse { .. } => Stage::Dispatch,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            NodeError::InvalidTokenResponse { .. } => ErrorCategory::AuthError,
            _ => match self.stage() {
                Stage::Host | Stage::Params => ErrorCategory::ConfigurationError,
                Stage::Payload => ErrorCategory::PayloadError,
                Stage::Connection => ErrorCategory::ConnectionConfigError,
                Stage::Token => ErrorCategory::AuthError,
                Stage::Dispatch => ErrorCategory::DispatchError,
            },
        }
    }

    /// HTTP status of the remote response, when one was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NodeError::TokenRequestFailed { status }
            | NodeError::RemoteError { status, .. }
            | NodeError::RemoteErrorUnstructured { status } => Some(*status),
            NodeError::TokenTransportError(e) | NodeError::DispatchTransportError(e) => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }

    /// Connection profile field whose absence caused this error
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            NodeError::MissingHost => Some("host"),
            NodeError::MissingAccessKey => Some("accessKey"),
            NodeError::MissingInstanceId => Some("instanceId"),
            NodeError::MissingUsername => Some("username"),
            NodeError::MissingPassword => Some("password"),
            _ => None,
        }
    }

    /// Underlying error or response body, as JSON
    pub fn raw(&self) -> Option<Value> {
        match self {
            NodeError::RemoteError { raw, .. } => Some(raw.clone()),
            _ => self.underlying(),
        }
    }

    /// Transport error the client reported, as JSON.
    ///
    /// Remote response bodies are not included: their text is already part
    /// of the display message.
    pub fn underlying(&self) -> Option<Value> {
        match self {
            NodeError::TokenTransportError(e)
            | NodeError::DispatchTransportError(e)
            | NodeError::HttpClient(e) => Some(json!({ "message": e.to_string() })),
            _ => None,
        }
    }
}

impl FixSuggestion for NodeError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            NodeError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            NodeError::Io(_) => Some("Check file path and permissions"),
            NodeError::UnsupportedNodeType { .. } => {
                Some("Set node.type to 'ai-function' or remove it")
            }
            NodeError::HttpClient(_) => Some("Check the system TLS configuration"),
            NodeError::MissingMode => Some("Set node.mode (currently only 'runFunction')"),
            NodeError::MissingDeploymentId { .. } => {
                Some("Set node.deploymentId to the ID of an online deployment")
            }
            NodeError::MissingPayload => {
                Some("Send an array of values or an object with a 'values' key")
            }
            NodeError::MissingValues => Some("Add a 'values' key to the payload object"),
            NodeError::InvalidPayloadShape { .. } => {
                Some("Send an array of values or an object with a 'values' key")
            }
            NodeError::MissingConnection => {
                Some("Add a connection: section or set the WML_* environment variables")
            }
            NodeError::MissingHost => Some("Set connection.host or WML_HOST"),
            NodeError::MissingAccessKey => Some("Set connection.accessKey or WML_ACCESS_KEY"),
            NodeError::MissingInstanceId => {
                Some("Set connection.instanceId or WML_INSTANCE_ID")
            }
            NodeError::MissingUsername => Some("Set connection.username or WML_USERNAME"),
            NodeError::MissingPassword => Some("Set connection.password or WML_PASSWORD"),
            NodeError::InvalidHost { .. } => {
                Some("Use an absolute URL such as https://us-south.ml.cloud.ibm.com")
            }
            NodeError::TokenRequestFailed { .. } => Some("Check the service username and password"),
            NodeError::TokenTransportError(_) => Some("Check the host is reachable"),
            NodeError::InvalidTokenResponse { .. } => {
                Some("Check the host points at the machine learning service")
            }
            NodeError::MalformedTokenResponse { .. } => {
                Some("Check the host points at the machine learning service")
            }
            NodeError::UnknownMode { .. } => Some("Use a supported mode: 'runFunction'"),
            NodeError::RemoteError { .. } => {
                Some("Check the payload matches the deployment's input schema")
            }
            NodeError::RemoteErrorUnstructured { .. } => {
                Some("Check the deployment ID and instance ID")
            }
            NodeError::DispatchTransportError(_) => Some("Check the host is reachable"),
            NodeError::InvalidScoringResponse { .. } => {
                Some("Check the deployment returns JSON")
            }
        }
    }
}

// ============================================================================
// ERROR REPORT
// ============================================================================

/// Structured error attached to the outbound message as `result.error`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub stage: Stage,
    pub category: ErrorCategory,
    pub kind: &'static str,
    /// Human-readable text (also used as the node status)
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&NodeError> for ErrorReport {
    fn from(err: &NodeError) -> Self {
        Self {
            stage: err.stage(),
            category: err.category(),
            kind: err.kind(),
            message: normalize_message(err, err.underlying().as_ref()),
            status_code: err.status_code(),
            raw: err.raw(),
            suggestion: err.fix_suggestion().map(str::to_string),
        }
    }
}

/// Pick the most specific human-readable text for an error.
///
/// Prefers a string `error`, then `description`, then `message` field of the
/// underlying value, falling back to the error's own display text. Remote
/// errors always use their display text.
pub fn normalize_message(err: &NodeError, raw: Option<&Value>) -> String {
    if matches!(
        err,
        NodeError::RemoteError { .. } | NodeError::RemoteErrorUnstructured { .. }
    ) {
        return err.to_string();
    }
    raw.and_then(Value::as_object)
        .and_then(|obj| {
            ["error", "description", "message"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str).filter(|t| !t.is_empty()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}
