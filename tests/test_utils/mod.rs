//! Test utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};
use futures::stream;
use tokio::sync::Notify;

use dilemma::ai::model::{
    BoxedConversation, FragmentStream, ModelClient, ModelConversation, ModelRequestFailure,
};
use dilemma::api::{AppState, SharedState, app};
use dilemma::core::AppConfig;

/// What the fake model does for one prompt.
pub enum ScriptedReply {
    /// Streams each fragment in order.
    Text(Vec<&'static str>),
    /// Streams one fragment and then fails.
    Fail(&'static str),
    /// Waits for the gate to open before streaming.
    Gated(Arc<Notify>, Vec<&'static str>),
}

/// A model whose replies are scripted up front. Every conversation
/// started from it pulls from the same queue and records the prompts it
/// was sent.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

struct ScriptedConversation {
    model: ScriptedModel,
}

impl ModelConversation for ScriptedConversation {
    fn send<'a>(&'a mut self, prompt: &str) -> FragmentStream<'a> {
        self.model.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.model.replies.lock().unwrap().pop_front();

        match reply {
            Some(ScriptedReply::Text(fragments)) => Box::pin(stream::iter(
                fragments.into_iter().map(|f| Ok(f.to_string())),
            )),
            Some(ScriptedReply::Fail(msg)) => Box::pin(stream::iter(vec![
                Ok("I hear ".to_string()),
                Err(ModelRequestFailure::Other(msg.to_string())),
            ])),
            Some(ScriptedReply::Gated(gate, fragments)) => Box::pin(async_stream::stream! {
                gate.notified().await;
                for fragment in fragments {
                    yield Ok::<_, ModelRequestFailure>(fragment.to_string());
                }
            }),
            None => Box::pin(stream::iter(vec![Err(ModelRequestFailure::Other(
                "No more scripted replies".to_string(),
            ))])),
        }
    }
}

impl ModelClient for ScriptedModel {
    fn start_chat(&self) -> BoxedConversation {
        Box::new(ScriptedConversation {
            model: self.clone(),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        google_api_key: String::from("test-api-key"),
        gemini_api_hostname: String::from("http://localhost:9"),
        gemini_model: String::from("gemini-test"),
        web_ui_path: format!("{}/web-ui/src", env!("CARGO_MANIFEST_DIR")),
        session_idle_timeout: Duration::from_secs(60 * 60),
    }
}

/// Creates a test application router backed by a scripted model.
pub fn test_app(model: ScriptedModel) -> Router {
    test_app_with_state(model).0
}

/// Like `test_app` but also hands back the shared state so tests can
/// reach into the session registry.
pub fn test_app_with_state(model: ScriptedModel) -> (Router, SharedState) {
    let app_state = Arc::new(RwLock::new(AppState::new(test_config(), Arc::new(model))));
    let router = app(Arc::clone(&app_state)).expect("Failed to build app");
    (router, app_state)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body was not UTF-8")
}

/// Parses the JSON payload of each SSE event in a response body,
/// skipping keep-alives.
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter_map(|event| {
            let data: Vec<&str> = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|data| data.trim_start())
                .collect();
            if data.is_empty() {
                return None;
            }
            serde_json::from_str(&data.join("\n")).ok()
        })
        .collect()
}
