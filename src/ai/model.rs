//! The seam between a chat session and whatever language model backs
//! it. A `ModelClient` opens conversations and a `ModelConversation`
//! streams back the reply for each prompt while remembering earlier
//! turns.

use futures::stream::BoxStream;
use thiserror::Error;

/// Anything that goes wrong while composing, sending or streaming a
/// model response. Callers handle every variant the same way.
#[derive(Debug, Error)]
pub enum ModelRequestFailure {
    #[error("failed to compose prompt: {0}")]
    Prompt(#[from] handlebars::RenderError),

    #[error("request to the model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model response was not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("response was blocked: {0}")]
    Blocked(String),

    #[error("{0}")]
    Other(String),
}

/// A finite, single-pass sequence of text fragments.
pub type FragmentStream<'a> = BoxStream<'a, Result<String, ModelRequestFailure>>;

/// An open conversation with the model. Prior turns are kept so the
/// model sees them on every request. A turn is only remembered once
/// its stream has finished without error.
pub trait ModelConversation: Send {
    fn send<'a>(&'a mut self, prompt: &str) -> FragmentStream<'a>;
}

pub type BoxedConversation = Box<dyn ModelConversation>;

pub trait ModelClient: Send + Sync {
    /// Start a conversation with an empty history.
    fn start_chat(&self) -> BoxedConversation;
}
