//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use assistant_relay::api::{self, ApiState};
use assistant_relay::{
    AssistantApi, Channel, InstructionResolver, OpenAiAssistantClient, OutgoingMessage,
    PollPolicy, Relay, RunOrchestrator, SessionRegistry, SessionScope, VisionClient,
};
use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const VERIFY_TOKEN: &str = "verify-me";
pub const ASSISTANT_ID: &str = "asst_test";
pub const THREAD_ID: &str = "thread_abc";
pub const RUN_ID: &str = "run_1";

/// Channel that forwards every sent message to a test receiver
pub struct RecordingChannel {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl RecordingChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: OutgoingMessage) -> assistant_relay::Result<()> {
        self.tx
            .send(message)
            .map_err(|e| assistant_relay::Error::Channel(e.to_string()))
    }
}

/// Mount a thread that completes on the second poll and replies with `reply`
pub async fn mount_assistant(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": THREAD_ID, "object": "thread"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/threads/{THREAD_ID}/runs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": RUN_ID, "thread_id": THREAD_ID, "status": "queued"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/threads/{THREAD_ID}/runs/{RUN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": RUN_ID, "thread_id": THREAD_ID, "status": "in_progress"
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/threads/{THREAD_ID}/runs/{RUN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": RUN_ID, "thread_id": THREAD_ID, "status": "completed"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/threads/{THREAD_ID}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{
                "id": "msg_reply",
                "role": "assistant",
                "run_id": RUN_ID,
                "content": [{"type": "text", "text": {"value": reply, "annotations": []}}]
            }]
        })))
        .mount(server)
        .await;
}

/// Accept any user message appended to the test thread
pub async fn mount_user_messages(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/threads/{THREAD_ID}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_user", "role": "user", "content": []
        })))
        .mount(server)
        .await;
}

/// Build a router wired to the mock service, returning the reply receiver
pub fn build_test_router(
    server: &MockServer,
    default_recipient: Option<&str>,
) -> (axum::Router, mpsc::UnboundedReceiver<OutgoingMessage>) {
    build_test_router_with_scope(server, default_recipient, SessionScope::PerSender)
}

/// Same as [`build_test_router`] with an explicit session scope
pub fn build_test_router_with_scope(
    server: &MockServer,
    default_recipient: Option<&str>,
    scope: SessionScope,
) -> (axum::Router, mpsc::UnboundedReceiver<OutgoingMessage>) {
    let base_url = format!("{}/v1", server.uri());
    let key = SecretString::from("sk-test".to_string());

    let assistant: Arc<dyn AssistantApi> =
        Arc::new(OpenAiAssistantClient::new(base_url.clone(), key.clone()));
    let vision = VisionClient::new(base_url, key).expect("vision client");
    let poll = PollPolicy {
        interval: Duration::from_millis(5),
        max_attempts: 10,
    };

    let (channel, rx) = RecordingChannel::new();
    let relay = Relay::new(
        InstructionResolver::new(Arc::new(vision)),
        SessionRegistry::new(Arc::clone(&assistant), scope),
        RunOrchestrator::new(assistant, ASSISTANT_ID, poll),
        Arc::new(channel),
    )
    .with_default_recipient(default_recipient.map(ToString::to_string));

    let state = Arc::new(ApiState {
        relay: Arc::new(relay),
        verify_token: SecretString::from(VERIFY_TOKEN.to_string()),
    });

    (api::router(state), rx)
}

/// Wait for the background relay task to deliver a reply
pub async fn next_reply(rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>) -> OutgoingMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for reply")
        .expect("channel closed")
}
