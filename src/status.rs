//! Node status channel
//!
//! Records what the host would show on the node: coloured status badges
//! while a message is in flight, and error reports when it fails.
//! - NodeStatus: fill + shape + text badge
//! - StatusEventKind: Status / Cleared / Error
//! - StatusLog: thread-safe log shared by all runs of a node, holding the
//!   current badge and a bounded window of recent events

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

/// Status texts, in the order a successful run reports them
pub const INITIALISING: &str = "initialising";
pub const REQUESTING_TOKEN: &str = "requesting token";
pub const EXECUTING: &str = "executing";
pub const PROCESSING_RESPONSE: &str = "processing response";

/// Events kept by [`StatusLog::new`]
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Blue,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Dot,
}

/// Badge shown on the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub fill: Fill,
    pub shape: Shape,
    pub text: String,
}

impl NodeStatus {
    /// Blue dot: work in progress
    pub fn progress(text: impl Into<String>) -> Self {
        Self {
            fill: Fill::Blue,
            shape: Shape::Dot,
            text: text.into(),
        }
    }

    /// Red dot: run failed
    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            fill: Fill::Red,
            shape: Shape::Dot,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEventKind {
    Status(NodeStatus),
    Cleared,
    /// Error raised to the host, with the structured report as context
    Error { message: String, context: Value },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    /// Monotonic sequence ID
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    /// Message the event belongs to, when known
    pub msg_id: Option<Arc<str>>,
    pub kind: StatusEventKind,
}

#[derive(Debug, Default)]
struct LogState {
    events: VecDeque<StatusEvent>,
    current: Option<NodeStatus>,
}

#[derive(Clone)]
pub struct StatusLog {
    state: Arc<RwLock<LogState>>,
    capacity: usize,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Keep at most `capacity` events; the oldest are dropped first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(LogState::default())),
            capacity: capacity.max(1),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    fn emit(&self, msg_id: Option<&Arc<str>>, kind: StatusEventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        match &kind {
            StatusEventKind::Status(s) => state.current = Some(s.clone()),
            StatusEventKind::Cleared => state.current = None,
            StatusEventKind::Error { .. } => {}
        }
        state.events.push_back(StatusEvent {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            msg_id: msg_id.cloned(),
            kind,
        });
        while state.events.len() > self.capacity {
            state.events.pop_front();
        }
        id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn status(&self, msg_id: Option<&Arc<str>>, status: NodeStatus) -> u64 {
        self.emit(msg_id, StatusEventKind::Status(status))
    }

    pub fn clear(&self, msg_id: Option<&Arc<str>>) -> u64 {
        self.emit(msg_id, StatusEventKind::Cleared)
    }

    pub fn error(&self, msg_id: Option<&Arc<str>>, message: impl Into<String>, context: Value) -> u64 {
        self.emit(
            msg_id,
            StatusEventKind::Error {
                message: message.into(),
                context,
            },
        )
    }

    /// Get retained events, oldest first (cloned)
    pub fn events(&self) -> Vec<StatusEvent> {
        self.state.read().events.iter().cloned().collect()
    }

    pub fn filter_message(&self, msg_id: &str) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.msg_id.as_deref() == Some(msg_id))
            .collect()
    }

    /// Status texts in emission order (errors and clears skipped)
    pub fn status_texts(&self) -> Vec<String> {
        self.state
            .read()
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                StatusEventKind::Status(s) => Some(s.text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Badge currently shown (None once cleared)
    pub fn current(&self) -> Option<NodeStatus> {
        self.state.read().current.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state
            .read()
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                StatusEventKind::Error { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic() {
        let log = StatusLog::new();
        let a = log.status(None, NodeStatus::progress(INITIALISING));
        let b = log.clear(None);
        assert!(b > a);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn current_tracks_last_badge() {
        let log = StatusLog::new();
        assert!(log.current().is_none());

        log.status(None, NodeStatus::progress(EXECUTING));
        assert_eq!(log.current(), Some(NodeStatus::progress(EXECUTING)));

        log.error(None, "boom", json!({}));
        assert_eq!(log.current(), Some(NodeStatus::progress(EXECUTING)));

        log.clear(None);
        assert!(log.current().is_none());
    }

    #[test]
    fn filter_by_message() {
        let log = StatusLog::new();
        let m1: Arc<str> = Arc::from("m1");
        let m2: Arc<str> = Arc::from("m2");
        log.status(Some(&m1), NodeStatus::progress(INITIALISING));
        log.status(Some(&m2), NodeStatus::progress(INITIALISING));
        log.error(Some(&m1), "boom", json!({"kind": "MissingMode"}));

        assert_eq!(log.filter_message("m1").len(), 2);
        assert_eq!(log.filter_message("m2").len(), 1);
        assert_eq!(log.errors(), vec!["boom".to_string()]);
    }

    #[test]
    fn window_is_bounded() {
        let log = StatusLog::with_capacity(16);
        for i in 0..1000 {
            let id: Arc<str> = Arc::from(format!("m{}", i));
            log.status(Some(&id), NodeStatus::progress(INITIALISING));
            log.status(Some(&id), NodeStatus::failure("bad"));
            log.error(Some(&id), "bad", json!({}));
        }

        assert_eq!(log.len(), 16);
        let events = log.events();
        assert_eq!(events.first().unwrap().id, 3000 - 16);
        assert_eq!(events.last().unwrap().id, 2999);
        assert!(log.filter_message("m0").is_empty());
        assert_eq!(log.filter_message("m999").len(), 3);
    }

    #[test]
    fn current_survives_eviction() {
        let log = StatusLog::with_capacity(2);
        log.status(None, NodeStatus::failure("bad"));
        log.error(None, "bad", json!({}));
        log.error(None, "worse", json!({}));

        assert_eq!(log.len(), 2);
        assert_eq!(log.status_texts(), Vec::<String>::new());
        assert_eq!(log.current(), Some(NodeStatus::failure("bad")));
    }

    #[test]
    fn default_capacity() {
        assert_eq!(StatusLog::new().capacity(), DEFAULT_CAPACITY);
        assert_eq!(StatusLog::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn serializes_tagged() {
        let log = StatusLog::new();
        log.status(None, NodeStatus::failure("bad"));
        let json = log.to_json();
        assert_eq!(json[0]["kind"]["type"], "status");
        assert_eq!(json[0]["kind"]["fill"], "red");
        assert_eq!(json[0]["kind"]["shape"], "dot");
        assert_eq!(json[0]["kind"]["text"], "bad");
    }
}
