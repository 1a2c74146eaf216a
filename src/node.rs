//! The `ai-function` node
//!
//! Long-lived node instance: holds the static configuration, the shared HTTP
//! client and the status log. Every inbound message gets its own
//! [`RequestPipeline`], so concurrent messages share nothing mutable.

use std::sync::Arc;

use tracing::debug;

use crate::config::{ConnectionProfile, NodeConfig, NodeFile};
use crate::dispatch::Dispatcher;
use crate::error::NodeError;
use crate::message::Message;
use crate::pipeline::RequestPipeline;
use crate::status::StatusLog;
use crate::token::TokenFetcher;

/// Type name the node registers under
pub const NODE_TYPE: &str = "ai-function";

const USER_AGENT: &str = concat!("wml-node/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FunctionNode {
    config: Arc<NodeConfig>,
    connection: Option<Arc<ConnectionProfile>>,
    tokens: TokenFetcher,
    dispatcher: Dispatcher,
    status: StatusLog,
}

impl FunctionNode {
    /// Build a node with its own HTTP client (transport-default timeouts)
    pub fn new(file: NodeFile) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(NodeError::HttpClient)?;
        Ok(Self::with_client(file, client))
    }

    pub fn with_client(file: NodeFile, client: reqwest::Client) -> Self {
        debug!(
            node = file.node.display_name(),
            mode = ?file.node.mode,
            has_connection = file.connection.is_some(),
            "Creating node"
        );
        Self {
            config: Arc::new(file.node),
            connection: file.connection.map(Arc::new),
            tokens: TokenFetcher::new(client.clone()),
            dispatcher: Dispatcher::new(client),
            status: StatusLog::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn connection(&self) -> Option<&ConnectionProfile> {
        self.connection.as_deref()
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    /// Fresh pipeline for one message
    pub fn pipeline(&self) -> RequestPipeline<'_> {
        RequestPipeline::new(
            &self.config,
            self.connection.as_deref(),
            &self.tokens,
            &self.dispatcher,
            &self.status,
        )
    }

    /// Handle an inbound message; the returned message is always emitted
    pub async fn on_input(&self, msg: Message) -> Message {
        self.pipeline().handle(msg).await
    }
}
