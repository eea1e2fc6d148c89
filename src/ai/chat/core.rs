use futures_util::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::models::{Message, Role, Transcript};
use crate::ai::model::{BoxedConversation, ModelClient, ModelRequestFailure};
use crate::ai::prompt::{GREETING, counselor_prompt};
use crate::ai::stage::{Stage, advance};

/// The state of one user's conversation with the counselor.
///
/// A session owns its model conversation for its whole life. It is
/// created once when the user arrives and dropped when they leave;
/// nothing is written to disk.
pub struct Session {
    pub id: String,
    transcript: Transcript,
    initial_greeting_sent: bool,
    question_count: u8,
    conversation: BoxedConversation,
}

impl Session {
    pub fn new(id: &str, conversation: BoxedConversation) -> Self {
        Self {
            id: id.to_string(),
            transcript: Transcript::new(),
            initial_greeting_sent: false,
            question_count: 0,
            conversation,
        }
    }

    /// Opens a new conversation with the model and greets the user.
    pub fn start(client: &dyn ModelClient) -> Self {
        let id = Uuid::new_v4().to_string();
        let mut session = Self::new(&id, client.start_chat());
        session.ensure_greeting();
        session
    }

    /// Adds the greeting to the history the first time it's called and
    /// does nothing afterwards.
    pub fn ensure_greeting(&mut self) {
        if !self.initial_greeting_sent {
            self.transcript.push(Message::new(Role::Assistant, GREETING));
            self.initial_greeting_sent = true;
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.messages()
    }

    pub fn question_count(&self) -> u8 {
        self.question_count
    }

    pub fn stage(&self) -> Stage {
        Stage::from_count(self.question_count)
    }

    /// Runs one turn: composes the prompt for the current stage, streams
    /// the reply to `tx` fragment by fragment, then records the turn and
    /// advances the question counter.
    ///
    /// On failure nothing is recorded. Fragments that already reached
    /// `tx` are left for the caller to discard.
    pub async fn next_turn(
        &mut self,
        user_text: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<Message, ModelRequestFailure> {
        let prompt = counselor_prompt(self.question_count, user_text)?;
        tracing::debug!(
            session_id = %self.id,
            question_count = self.question_count,
            "Sending counselor prompt"
        );

        let mut reply = String::new();
        let mut stream = self.conversation.send(&prompt);
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            reply.push_str(&fragment);
            // The result is ignored because the turn should finish even
            // if nobody is listening anymore
            let _ = tx.send(fragment);
        }
        drop(stream);

        let assistant_msg = Message::new(Role::Assistant, &reply);
        self.transcript.push(Message::new(Role::User, user_text));
        self.transcript.push(assistant_msg.clone());

        let next_count = advance(self.question_count, &reply);
        if next_count != self.question_count {
            tracing::info!(
                session_id = %self.id,
                "Question count {} -> {}",
                self.question_count,
                next_count
            );
        }
        self.question_count = next_count;

        Ok(assistant_msg)
    }
}

/// The inline message shown to the user when a turn fails.
pub fn error_banner(err: &ModelRequestFailure) -> String {
    format!(
        "Something went wrong while answering: {}. Check the API key or try again in a moment.",
        err
    )
}
