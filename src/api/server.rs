use std::sync::{Arc, RwLock};

use anyhow::{Context, Result, anyhow};
use axum::middleware;
use axum::{Router, extract::Request, response::Response};
use http::{HeaderValue, header};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::{AppState, SharedState, expire_idle_sessions};
use crate::core::AppConfig;
use crate::gemini::GeminiClient;

async fn set_static_cache_control(request: Request, next: middleware::Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

pub fn app(shared_state: SharedState) -> Result<Router> {
    let cors = CorsLayer::permissive();
    let web_ui_path = shared_state
        .read()
        .map_err(|e| anyhow!("Unable to read shared state: {}", e))?
        .config
        .web_ui_path
        .clone();

    let router = Router::new()
        // API routes
        .nest("/api", routes::router())
        // Static server of assets for the web UI
        .fallback_service(
            ServiceBuilder::new()
                .layer(middleware::from_fn(set_static_cache_control))
                .service(ServeDir::new(web_ui_path)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state);

    Ok(router)
}

// Run the server
pub async fn serve(host: String, port: String, config: AppConfig) -> Result<()> {
    let model = GeminiClient::new(
        &config.gemini_api_hostname,
        &config.google_api_key,
        &config.gemini_model,
    );
    tracing::info!("Using Gemini model {}", model.model());

    let idle_timeout = config.session_idle_timeout;
    let app_state = Arc::new(RwLock::new(AppState::new(config, Arc::new(model))));
    let app = app(Arc::clone(&app_state))?;

    // Sessions the browser never ended are dropped once idle
    tokio::spawn(expire_idle_sessions(app_state, idle_timeout));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", host, port))?;

    tracing::debug!(
        "Server started. Listening on {}",
        listener.local_addr().context("Listener has no local address")?
    );

    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
