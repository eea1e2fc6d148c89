use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ai::model::{
    BoxedConversation, FragmentStream, ModelClient, ModelConversation, ModelRequestFailure,
};

pub const DEFAULT_API_HOSTNAME: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, text: &str) -> Self {
        Content {
            role,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

// Gemini streams the same shape as a non-streaming response, one
// partial candidate per event:
//
// {
//   "candidates": [{
//     "content": {"parts": [{"text": "I hear"}], "role": "model"},
//     "finishReason": "STOP",
//     "index": 0
//   }],
//   "usageMetadata": {...},
//   "modelVersion": "gemini-1.5-flash"
// }
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentChunk {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

// Finish reasons where the model stopped without producing an answer
// the user can read
const BLOCKING_FINISH_REASONS: &[&str] =
    &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

fn api_error(status: u16, body: &str) -> ModelRequestFailure {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| error_message(&wrapper.error, body))
        .unwrap_or_else(|_| body.to_string());
    ModelRequestFailure::Api { status, message }
}

fn error_message(error: &ErrorBody, fallback: &str) -> String {
    let msg = error.message.clone().unwrap_or_else(|| fallback.to_string());
    match &error.status {
        Some(status) if !status.is_empty() => format!("{status}: {msg}"),
        _ => msg,
    }
}

/// Pops the next complete SSE event off the front of `buffer`. Events
/// end with a blank line which Google sends as `\r\n\r\n`, but plain
/// `\n\n` is accepted too. Returns `None` until a whole event has
/// arrived.
fn next_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let find = |needle: &[u8]| buffer.windows(needle.len()).position(|w| w == needle);
    let (end, sep_len) = [
        find(b"\n\n").map(|i| (i, 2)),
        find(b"\r\n\r\n").map(|i| (i, 4)),
    ]
    .into_iter()
    .flatten()
    .min_by_key(|(i, _)| *i)?;

    let event = buffer[..end].to_vec();
    buffer.drain(..end + sep_len);
    Some(event)
}

/// Joins the `data:` lines of a single SSE event.
fn event_data(event: &str) -> Option<String> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Extracts the text carried by one streamed chunk, if any.
fn fragment_from_data(data: &str) -> Result<Option<String>, ModelRequestFailure> {
    let chunk = serde_json::from_str::<GenerateContentChunk>(data).inspect_err(|e| {
        tracing::error!("Parsing Gemini chunk failed for {}\nError:{}", data, e)
    })?;

    if let Some(error) = &chunk.error {
        return Err(ModelRequestFailure::Api {
            status: error.code.unwrap_or(500),
            message: error_message(error, data),
        });
    }

    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelRequestFailure::Blocked(reason));
    }

    let Some(candidate) = chunk.candidates.and_then(|c| c.into_iter().next()) else {
        return Ok(None);
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(Some(text));
    }

    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(ModelRequestFailure::Blocked(reason))
        }
        _ => Ok(None),
    }
}

/// Turns a non-2xx response into a failure carrying the API's message.
async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ModelRequestFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
    tracing::error!(%status, %body, "Gemini API request failed");
    Err(api_error(status.as_u16(), &body))
}

fn parse_event(event: &[u8]) -> Result<Option<String>, ModelRequestFailure> {
    let event = std::str::from_utf8(event)?;
    match event_data(event) {
        Some(data) => fragment_from_data(&data),
        None => Ok(None),
    }
}

/// Opens Gemini chat conversations.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ModelClient for GeminiClient {
    fn start_chat(&self) -> BoxedConversation {
        tracing::debug!("Starting Gemini chat with model {}", self.model);
        Box::new(GeminiChat {
            http: self.http.clone(),
            api_hostname: self.api_hostname.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            history: Vec::new(),
        })
    }
}

/// A Gemini conversation. The REST API is stateless so the history of
/// completed turns is kept here and sent along with every prompt.
#[derive(Debug)]
pub struct GeminiChat {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
    history: Vec<Content>,
}

impl GeminiChat {
    #[cfg(test)]
    fn history(&self) -> &[Content] {
        &self.history
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.api_hostname.trim_end_matches('/'),
            self.model
        )
    }
}

impl ModelConversation for GeminiChat {
    fn send<'a>(&'a mut self, prompt: &str) -> FragmentStream<'a> {
        let prompt = prompt.to_string();

        Box::pin(async_stream::try_stream! {
            let this = self;
            let mut contents = this.history.clone();
            contents.push(Content::new(Role::User, &prompt));

            let response = this
                .http
                .post(this.stream_url())
                .header("x-goog-api-key", &this.api_key)
                .header("Content-Type", "application/json")
                .timeout(Duration::from_secs(60 * 5))
                .json(&json!({ "contents": contents }))
                .send()
                .await?;

            let response = check_status(response).await?;

            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut reply = String::new();

            while let Some(chunk) = stream.next().await {
                // Events can be split across network chunks so only
                // complete ones are taken off the buffer
                buffer.extend_from_slice(&chunk?);
                while let Some(event) = next_event(&mut buffer) {
                    if let Some(text) = parse_event(&event)? {
                        reply.push_str(&text);
                        yield text;
                    }
                }
            }

            // The final event may not be followed by a blank line
            if !buffer.is_empty() {
                if let Some(text) = parse_event(&buffer)? {
                    reply.push_str(&text);
                    yield text;
                }
            }

            // Nothing readable came back, e.g. the reply was cut off by
            // MAX_TOKENS before any text
            if reply.is_empty() {
                Err::<(), _>(ModelRequestFailure::Other(
                    "model returned an empty response".to_string(),
                ))?;
            }

            tracing::debug!("Gemini reply finished ({} bytes)", reply.len());
            this.history.push(Content::new(Role::User, &prompt));
            this.history.push(Content::new(Role::Model, &reply));
        })
    }
}
