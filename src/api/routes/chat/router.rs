//! Router for the chat API

use std::time::Duration;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public::{self, TurnEvent};
use crate::ai::chat::error_banner;
use crate::api::public::ApiError;
use crate::api::state::{SharedSession, SharedState};

fn find_session(state: &SharedState, id: &str) -> Result<Option<SharedSession>, ApiError> {
    let mut shared_state = state
        .write()
        .map_err(|e| anyhow!("Unable to write shared state: {}", e))?;
    Ok(shared_state.find_session(id))
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("Chat session {} not found", id),
    )
        .into_response()
}

/// Start a new session. The greeting is already in the history.
async fn create_session(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let (_, session) = state
        .write()
        .map_err(|e| anyhow!("Unable to write shared state: {}", e))?
        .create_session();

    let resp = public::SessionResponse::from(&*session.lock().await);
    Ok((StatusCode::CREATED, Json(resp)).into_response())
}

/// Get a single chat session by ID
async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(session) = find_session(&state, &id)? else {
        return Ok(not_found(&id));
    };

    let resp = public::SessionResponse::from(&*session.lock().await);
    Ok(Json(resp).into_response())
}

/// End a session and release its model conversation
async fn end_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let removed = state
        .write()
        .map_err(|e| anyhow!("Unable to write shared state: {}", e))?
        .end_session(&id);

    if removed {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(not_found(&id))
    }
}

/// Run the next turn of a session and stream the response
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatRequest>,
) -> Result<Response, ApiError> {
    let public::ChatRequest {
        session_id,
        message,
    } = payload;

    let Some(session) = find_session(&state, &session_id)? else {
        return Ok(not_found(&session_id));
    };

    // Only one turn per session may be in flight
    let Ok(mut session) = session.try_lock_owned() else {
        tracing::warn!("Rejected turn for busy session {}", session_id);
        return Ok((
            StatusCode::CONFLICT,
            "A reply is still streaming for this session",
        )
            .into_response());
    };

    let (tx, rx) = mpsc::unbounded_channel::<TurnEvent>();
    let sse_stream =
        UnboundedReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    // The turn runs to completion even if the client goes away so the
    // session history stays consistent
    tokio::spawn(async move {
        let (fragment_tx, mut fragment_rx) = mpsc::unbounded_channel::<String>();

        let forward_tx = tx.clone();
        let forward = async move {
            while let Some(text) = fragment_rx.recv().await {
                let _ = forward_tx.send(TurnEvent::Fragment { text });
            }
        };

        let turn = async {
            let result = session.next_turn(&message, &fragment_tx).await;
            // Closing the channel lets `forward` drain and finish
            drop(fragment_tx);
            result
        };

        let (result, ()) = tokio::join!(turn, forward);

        let event = match result {
            Ok(_) => TurnEvent::Done {
                question_count: session.question_count(),
                stage: session.stage(),
            },
            Err(e) => {
                tracing::error!("Turn failed for session {}: {}", session_id, e);
                TurnEvent::Error {
                    message: error_banner(&e),
                }
            }
        };
        let _ = tx.send(event);
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(end_session))
}
