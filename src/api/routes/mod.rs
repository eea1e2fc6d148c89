//! API routes module

pub mod chat;

use crate::api::state::SharedState;
use axum::Router;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat routes
        .nest("/chat", chat::router())
}
