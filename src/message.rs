//! Workflow message envelope
//!
//! Only `payload` and `result` are interpreted; every other property the
//! host attached travels through untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ErrorReport;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Host-assigned message ID
    #[serde(rename = "_msgid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Arc<str>>,
    #[serde(default)]
    pub payload: Value,
    /// Set to `{"error": ...}` when a run fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn with_payload(payload: Value) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replace `result` with `{"error": report}`
    pub fn set_error(&mut self, report: &ErrorReport) {
        self.result = Some(json!({ "error": report }));
    }

    pub fn error(&self) -> Option<&Value> {
        self.result.as_ref().and_then(|r| r.get("error"))
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}
