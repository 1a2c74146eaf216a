//! End-to-end pipeline tests against a wiremock scoring service
//!
//! Each test mounts the identity and scoring endpoints with `expect(n)` so
//! the number of network round-trips per run is verified on drop.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{any, basic_auth, bearer_token, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wml_node::status::{
    DEFAULT_CAPACITY, EXECUTING, INITIALISING, PROCESSING_RESPONSE, REQUESTING_TOKEN,
};
use wml_node::{FunctionNode, Message, NodeFile, PipelineState};

// =============================================================================
// HELPERS
// =============================================================================

const TOKEN_PATH: &str = "/v3/identity/token";
const SCORING_PATH: &str = "/v3/wml_instances/inst-1/deployments/d1/online";

fn node_yaml(host: &str, mode: &str, deployment_id: Option<&str>) -> String {
    let deployment = deployment_id
        .map(|d| format!("  deploymentId: {}\n", d))
        .unwrap_or_default();
    format!(
        "node:\n  mode: {mode}\n{deployment}connection:\n  host: {host}\n  accessKey: ak\n  instanceId: inst-1\n  username: user\n  password: pw\n"
    )
}

fn create_node(server: &MockServer, mode: &str, deployment_id: Option<&str>) -> FunctionNode {
    let file = NodeFile::from_yaml(&node_yaml(&server.uri(), mode, deployment_id)).unwrap();
    FunctionNode::new(file).unwrap()
}

async fn mount_token(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(basic_auth("user", "pw"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_scoring(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path(SCORING_PATH))
        .and(bearer_token("abc"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

fn token_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"token": "abc"}))
}

fn error_of(msg: &Message) -> &Value {
    msg.error().expect("message should carry result.error")
}

// =============================================================================
// SUCCESS PATH
// =============================================================================

#[tokio::test]
async fn test_scores_object_payload() {
    // Arrange
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    Mock::given(method("POST"))
        .and(path(SCORING_PATH))
        .and(bearer_token("abc"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"values": [[1, 2]], "fields": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": [0.9]})))
        .expect(1)
        .mount(&server)
        .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let msg = Message::with_payload(json!({"values": [[1, 2]], "fields": ["a", "b"]}));

    // Act
    let out = node.on_input(msg).await;

    // Assert
    assert!(!out.is_error(), "unexpected error: {:?}", out.result);
    assert_eq!(out.payload, json!({"values": [0.9]}));
    assert_eq!(
        node.status_log().status_texts(),
        vec![INITIALISING, REQUESTING_TOKEN, EXECUTING, PROCESSING_RESPONSE]
    );
    assert!(node.status_log().current().is_none());
    assert!(node.status_log().errors().is_empty());
}

#[tokio::test]
async fn test_scores_bare_array_payload() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    Mock::given(method("POST"))
        .and(path(SCORING_PATH))
        .and(body_json(json!({"values": [1, 2, 3]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": [[0.1]]})))
        .expect(1)
        .mount(&server)
        .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1, 2, 3]))).await;

    assert_eq!(out.payload, json!({"values": [[0.1]]}));
}

#[tokio::test]
async fn test_passthrough_properties_are_kept() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"values": [1]})),
        1,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let msg: Message =
        serde_json::from_value(json!({"_msgid": "m-7", "topic": "churn", "payload": [[3]]}))
            .unwrap();
    let out = node.on_input(msg).await;

    assert_eq!(out.id.as_deref(), Some("m-7"));
    assert_eq!(out.extra["topic"], "churn");
    assert_eq!(node.status_log().filter_message("m-7").len(), 5);
}

#[tokio::test]
async fn test_pipeline_visits_every_state() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({})),
        1,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let mut pipeline = node.pipeline();
    pipeline.handle(Message::with_payload(json!([1]))).await;

    assert_eq!(
        pipeline.history(),
        &[
            PipelineState::Idle,
            PipelineState::ValidatingParams,
            PipelineState::ValidatingPayload,
            PipelineState::ValidatingConnection,
            PipelineState::FetchingToken,
            PipelineState::Dispatching,
            PipelineState::Done,
        ]
    );
}

// =============================================================================
// DISPATCH ERRORS
// =============================================================================

#[tokio::test]
async fn test_structured_remote_error() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({"errors": [{"message": "bad input"}]})),
        1,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "RemoteError");
    assert_eq!(err["category"], "DispatchError");
    assert_eq!(err["statusCode"], 400);
    let text = err["message"].as_str().unwrap();
    assert!(text.contains("bad input"));
    assert!(text.contains("400"));
    assert_eq!(err["raw"], json!({"errors": [{"message": "bad input"}]}));

    // payload untouched, red badge, error reported
    assert_eq!(out.payload, json!([1]));
    let badge = node.status_log().current().unwrap();
    assert_eq!(badge.text, text);
    assert_eq!(node.status_log().errors(), vec![text.to_string()]);
}

#[tokio::test]
async fn test_remote_error_ignores_top_level_message() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    let envelope = json!({
        "errors": [{"message": "bad input"}],
        "message": "Bad Request",
        "description": "request rejected"
    });
    mount_scoring(
        &server,
        ResponseTemplate::new(400).set_body_json(envelope.clone()),
        1,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "RemoteError");
    assert_eq!(err["message"], "Error 400 bad input");
    assert_eq!(err["raw"], envelope);
    assert_eq!(node.status_log().current().unwrap().text, "Error 400 bad input");
}

#[tokio::test]
async fn test_dispatch_transport_error() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"values": [1]}))
            .set_delay(Duration::from_secs(5)),
        1,
    )
    .await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let file = NodeFile::from_yaml(&node_yaml(&server.uri(), "runFunction", Some("d1"))).unwrap();
    let node = FunctionNode::with_client(file, client);
    let mut pipeline = node.pipeline();
    let out = pipeline.handle(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "DispatchTransportError");
    assert_eq!(err["stage"], "dispatch");
    assert_eq!(err["category"], "DispatchError");
    assert!(err["raw"]["message"].is_string());
    assert_eq!(
        &pipeline.history()[pipeline.history().len() - 2..],
        &[PipelineState::Dispatching, PipelineState::Failed]
    );
    assert_eq!(out.payload, json!([1]));
}

#[tokio::test]
async fn test_unstructured_remote_error() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(503).set_body_string("Service Unavailable"),
        1,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "RemoteErrorUnstructured");
    assert_eq!(err["statusCode"], 503);
    assert_eq!(err["message"], "Error performing request 503");
}

#[tokio::test]
async fn test_non_json_success_body() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    mount_scoring(&server, ResponseTemplate::new(200).set_body_string("<html>"), 1).await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    assert_eq!(error_of(&out)["kind"], "InvalidScoringResponse");
}

#[tokio::test]
async fn test_unknown_mode_fetches_token_but_never_scores() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let node = create_node(&server, "listModels", None);
    // payload is not validated for unknown modes
    let out = node.on_input(Message::with_payload(Value::Null)).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "UnknownMode");
    assert_eq!(err["stage"], "dispatch");
}

// =============================================================================
// TOKEN ERRORS
// =============================================================================

#[tokio::test]
async fn test_token_rejected() {
    let server = MockServer::start().await;
    mount_token(&server, ResponseTemplate::new(401), 1).await;
    mount_scoring(&server, ResponseTemplate::new(200), 0).await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "TokenRequestFailed");
    assert_eq!(err["category"], "AuthError");
    assert_eq!(err["statusCode"], 401);
    let texts = node.status_log().status_texts();
    assert_eq!(&texts[..2], &[INITIALISING, REQUESTING_TOKEN]);
}

#[tokio::test]
async fn test_token_missing_from_response() {
    let server = MockServer::start().await;
    mount_token(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"expires": 3600})),
        1,
    )
    .await;
    mount_scoring(&server, ResponseTemplate::new(200), 0).await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "InvalidTokenResponse");
    assert_eq!(err["category"], "AuthError");
    assert_eq!(err["stage"], "dispatch");
}

#[tokio::test]
async fn test_unreadable_token_body_fails_at_token_stage() {
    let server = MockServer::start().await;
    mount_token(&server, ResponseTemplate::new(200).set_body_string("<html>"), 1).await;
    mount_scoring(&server, ResponseTemplate::new(200), 0).await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let mut pipeline = node.pipeline();
    let out = pipeline.handle(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "MalformedTokenResponse");
    assert_eq!(err["stage"], "token");
    assert_eq!(err["category"], "AuthError");
    assert_eq!(
        &pipeline.history()[pipeline.history().len() - 2..],
        &[PipelineState::FetchingToken, PipelineState::Failed]
    );
}

#[tokio::test]
async fn test_token_transport_error() {
    // nothing listens on port 1
    let file = NodeFile::from_yaml(&node_yaml("http://127.0.0.1:1", "runFunction", Some("d1")))
        .unwrap();
    let node = FunctionNode::new(file).unwrap();

    let out = node.on_input(Message::with_payload(json!([1]))).await;

    let err = error_of(&out);
    assert_eq!(err["kind"], "TokenTransportError");
    assert_eq!(err["stage"], "token");
    assert!(err["raw"]["message"].is_string());
    assert_eq!(err["message"], err["raw"]["message"]);
}

// =============================================================================
// NO NETWORK ON VALIDATION FAILURE
// =============================================================================

#[tokio::test]
async fn test_missing_deployment_id_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let node = create_node(&server, "runFunction", None);
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    assert_eq!(error_of(&out)["kind"], "MissingDeploymentId");
    assert_eq!(error_of(&out)["category"], "ConfigurationError");
}

#[tokio::test]
async fn test_missing_password_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let yaml = node_yaml(&server.uri(), "runFunction", Some("d1")).replace("  password: pw\n", "");
    let node = FunctionNode::new(NodeFile::from_yaml(&yaml).unwrap()).unwrap();
    let out = node.on_input(Message::with_payload(json!([1]))).await;

    assert_eq!(error_of(&out)["kind"], "MissingPassword");
}

#[tokio::test]
async fn test_missing_values_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let out = node.on_input(Message::with_payload(json!({}))).await;

    assert_eq!(error_of(&out)["kind"], "MissingValues");
    assert_eq!(error_of(&out)["category"], "PayloadError");
}

// =============================================================================
// INDEPENDENT RUNS
// =============================================================================

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 2).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"values": [0.9]})),
        2,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let first = node.on_input(Message::with_payload(json!([1]))).await;
    let second = node.on_input(Message::with_payload(json!([1]))).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_messages() {
    let server = MockServer::start().await;
    mount_token(&server, token_ok(), 2).await;
    mount_scoring(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"values": [0.5]})),
        2,
    )
    .await;

    let node = create_node(&server, "runFunction", Some("d1"));
    let other = node.clone();

    let (a, b) = tokio::join!(
        node.on_input(Message::with_payload(json!([1])).with_id("a")),
        other.on_input(Message::with_payload(json!([2])).with_id("b")),
    );

    assert_eq!(a.payload, json!({"values": [0.5]}));
    assert_eq!(b.payload, json!({"values": [0.5]}));
    // clones share the status log
    assert_eq!(node.status_log().filter_message("a").len(), 5);
    assert_eq!(node.status_log().filter_message("b").len(), 5);
}

#[tokio::test]
async fn test_status_log_stays_bounded() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let node = create_node(&server, "runFunction", None);
    for i in 0..1000 {
        let msg = Message::with_payload(json!([i])).with_id(format!("m{}", i));
        node.on_input(msg).await;
    }

    let log = node.status_log();
    assert_eq!(log.len(), DEFAULT_CAPACITY);
    assert!(log.filter_message("m0").is_empty());
    assert_eq!(log.filter_message("m999").len(), 3);
    assert_eq!(log.current().unwrap().fill, wml_node::status::Fill::Red);
}
