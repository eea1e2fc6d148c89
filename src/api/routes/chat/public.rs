//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::ai::chat::{Message, Session};
use crate::ai::stage::Stage;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub question_count: u8,
    pub stage: Stage,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            messages: session.messages(),
            question_count: session.question_count(),
            stage: session.stage(),
        }
    }
}

/// Events streamed back over SSE while a turn runs. Any number of
/// `fragment` events is followed by exactly one `done` or `error`.
#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Fragment { text: String },
    Done { question_count: u8, stage: Stage },
    Error { message: String },
}
