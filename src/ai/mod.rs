pub mod chat;
pub mod model;
pub mod prompt;
pub mod stage;
