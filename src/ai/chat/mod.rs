mod core;
pub mod models;

pub use self::core::{Session, error_banner};
pub use models::{Message, Role, Transcript};
