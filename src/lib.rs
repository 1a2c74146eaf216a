//! wml-node - workflow node for Watson Machine Learning scoring
//!
//! Validates the node configuration and message payload, exchanges
//! credentials for a bearer token, scores the payload against an online
//! deployment, and writes the response (or a structured error) back onto
//! the message.

pub mod config;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod message;
pub mod mode;
pub mod node;
pub mod params;
pub mod pipeline;
pub mod status;
pub mod token;
pub mod validate;

pub use config::{ConnectionProfile, NodeConfig, NodeFile};
pub use dispatch::Dispatcher;
pub use endpoints::Connection;
pub use error::{ErrorCategory, ErrorReport, FixSuggestion, NodeError, Stage};
pub use message::Message;
pub use mode::Mode;
pub use node::{FunctionNode, NODE_TYPE};
pub use params::{ParamBag, ScoringPayload};
pub use pipeline::{PipelineState, RequestPipeline};
pub use status::{NodeStatus, StatusLog};
pub use token::{BearerToken, TokenFetcher};
