//! Per-message request pipeline
//!
//! ```text
//! Idle → ValidatingParams → ValidatingPayload → ValidatingConnection
//!      → FetchingToken → Dispatching → Done
//! ```
//!
//! Any stage may jump straight to `Failed`. Both terminal states emit the
//! message: on success the payload is replaced by the scoring response, on
//! failure `result.error` carries an [`ErrorReport`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConnectionProfile, NodeConfig};
use crate::dispatch::Dispatcher;
use crate::error::{ErrorReport, NodeError};
use crate::message::Message;
use crate::params::ParamBag;
use crate::status::{self, NodeStatus, StatusLog};
use crate::token::TokenFetcher;
use crate::validate::{check_connection, check_params, check_payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    ValidatingParams,
    ValidatingPayload,
    ValidatingConnection,
    FetchingToken,
    Dispatching,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// One run of the node. Built fresh for every inbound message.
pub struct RequestPipeline<'a> {
    config: &'a NodeConfig,
    connection: Option<&'a ConnectionProfile>,
    tokens: &'a TokenFetcher,
    dispatcher: &'a Dispatcher,
    status: &'a StatusLog,
    history: Vec<PipelineState>,
}

impl<'a> RequestPipeline<'a> {
    pub fn new(
        config: &'a NodeConfig,
        connection: Option<&'a ConnectionProfile>,
        tokens: &'a TokenFetcher,
        dispatcher: &'a Dispatcher,
        status: &'a StatusLog,
    ) -> Self {
        Self {
            config,
            connection,
            tokens,
            dispatcher,
            status,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Every state visited so far, starting with `Idle`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(from = ?self.state(), to = ?next, "Pipeline transition");
        self.history.push(next);
    }

    /// Process one message. The message is always returned.
    #[instrument(
        name = "pipeline",
        skip_all,
        fields(node = %self.config.display_name(), msg_id = ?msg.id)
    )]
    pub async fn handle(&mut self, mut msg: Message) -> Message {
        let msg_id = msg.id.clone();
        self.status
            .status(msg_id.as_ref(), NodeStatus::progress(status::INITIALISING));

        match self.run(&msg.payload, msg_id.as_ref()).await {
            Ok(response) => {
                self.status.status(
                    msg_id.as_ref(),
                    NodeStatus::progress(status::PROCESSING_RESPONSE),
                );
                msg.payload = response;
                self.enter(PipelineState::Done);
                self.status.clear(msg_id.as_ref());
                info!("Scoring completed");
            }
            Err(err) => {
                self.enter(PipelineState::Failed);
                self.report_error(&mut msg, msg_id.as_ref(), &err);
            }
        }
        msg
    }

    /// Run every stage and return the scoring response
    pub async fn run(
        &mut self,
        payload: &Value,
        msg_id: Option<&Arc<str>>,
    ) -> Result<Value, NodeError> {
        let mut params = ParamBag::new();

        self.enter(PipelineState::ValidatingParams);
        let mode = check_params(self.config, &mut params)?;

        self.enter(PipelineState::ValidatingPayload);
        check_payload(&mode, payload, &mut params)?;

        self.enter(PipelineState::ValidatingConnection);
        let conn = check_connection(self.connection)?;

        self.enter(PipelineState::FetchingToken);
        self.status
            .status(msg_id, NodeStatus::progress(status::REQUESTING_TOKEN));
        let token = self.tokens.fetch(&conn).await?;

        self.enter(PipelineState::Dispatching);
        self.status
            .status(msg_id, NodeStatus::progress(status::EXECUTING));
        self.dispatcher
            .dispatch(&mode, &conn, token.as_ref(), &params)
            .await
    }

    fn report_error(&self, msg: &mut Message, msg_id: Option<&Arc<str>>, err: &NodeError) {
        let report = ErrorReport::from(err);
        warn!(
            stage = %report.stage,
            kind = report.kind,
            error = %report.message,
            "Scoring failed"
        );

        self.status
            .status(msg_id, NodeStatus::failure(report.message.clone()));
        let context = serde_json::to_value(&report).unwrap_or(Value::Null);
        self.status.error(msg_id, report.message.clone(), context);
        msg.set_error(&report);
    }
}
