//! Counts the clarifying questions asked so far and decides which
//! stage of the conversation the next prompt belongs to.
//!
//! The counter moves forward only after an assistant reply that
//! contains a literal `?` and never past [`QUESTION_CAP`]. A `?`
//! anywhere in the reply counts, even inside a concluding answer.
use serde::Serialize;

/// Maximum number of clarifying questions before concluding.
pub const QUESTION_CAP: u8 = 2;

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AskingFirst,
    AskingSecond,
    Concluding,
}

impl Stage {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Stage::AskingFirst,
            1 => Stage::AskingSecond,
            _ => Stage::Concluding,
        }
    }
}

pub fn should_ask_clarifying_question(count: u8) -> bool {
    count < QUESTION_CAP
}

/// Returns the counter value after an assistant reply is finalized.
pub fn advance(count: u8, response_text: &str) -> u8 {
    if response_text.contains('?') && should_ask_clarifying_question(count) {
        count + 1
    } else {
        count
    }
}
