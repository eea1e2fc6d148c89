//! Client for the Google Gemini API.
mod core;
pub use self::core::*;
