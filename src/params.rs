//! Parameter bag and scoring input
//!
//! The parameter bag is filled in by the validation stages and consumed by
//! the dispatcher. Message payloads come in two shapes, modelled by
//! [`ScoringPayload`]; anything else is rejected at the boundary.

use serde::Serialize;
use serde_json::Value;

use crate::error::NodeError;

/// Request data accumulated across validation stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBag {
    pub deployment_id: Option<String>,
    pub values: Option<Value>,
    pub fields: Option<Value>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, payload: ScoringPayload) {
        match payload {
            ScoringPayload::Values(values) => {
                self.values = Some(Value::Array(values));
            }
            ScoringPayload::Object { values, fields } => {
                self.values = Some(values);
                if fields.is_some() {
                    self.fields = fields;
                }
            }
        }
    }

    /// JSON body for the scoring call
    pub fn scoring_request(&self) -> ScoringRequest<'_> {
        ScoringRequest {
            values: self.values.as_ref(),
            fields: self.fields.as_ref(),
        }
    }
}

/// Wire body: `{"values": [...], "fields"?: [...]}`
#[derive(Debug, Serialize, PartialEq)]
pub struct ScoringRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a Value>,
}

/// Accepted shapes of scoring input
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringPayload {
    /// Bare array, taken as `values`
    Values(Vec<Value>),
    /// Object with `values` and optional `fields`
    Object { values: Value, fields: Option<Value> },
}

impl ScoringPayload {
    /// Classify an inbound message payload
    pub fn from_payload(payload: &Value) -> Result<Self, NodeError> {
        if is_falsy(payload) {
            return Err(NodeError::MissingPayload);
        }
        match payload {
            Value::Array(items) => Ok(ScoringPayload::Values(items.clone())),
            Value::Object(obj) => {
                let values = obj
                    .get("values")
                    .filter(|v| !is_falsy(v))
                    .cloned()
                    .ok_or(NodeError::MissingValues)?;
                let fields = obj.get("fields").filter(|f| !is_falsy(f)).cloned();
                Ok(ScoringPayload::Object { values, fields })
            }
            other => Err(NodeError::InvalidPayloadShape {
                found: type_name(other),
            }),
        }
    }
}

/// Null, false, zero, and the empty string count as "nothing sent"
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
