//! HTTP gateway for toolchat.
//!
//! - `GET /chat_stream/{message}?checkpoint_id=..` streams one agent turn as
//!   server-sent events, one `data: <json>` frame per event
//! - `GET /health` reports the configured provider, checkpoint backend and tools
//!
//! Built on Axum. The [`AppContext`] is built once in [`start`] and shared by
//! every request.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use toolchat_agent::{AppContext, chat_stream, encode_frame};
use toolchat_config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to initialise agent: {0}")]
    Init(#[from] toolchat_core::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the router. CORS is wide open when `cors_allow_any` is set.
pub fn build_router(ctx: Arc<AppContext>, cors_allow_any: bool) -> Router {
    let router = Router::new()
        .route("/chat_stream/{message}", get(chat_stream_handler))
        .route("/health", get(health_handler))
        .with_state(ctx);

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Build the agent context and serve until the process is stopped.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let ctx = Arc::new(AppContext::build(&config).await?);
    let app = build_router(ctx, config.gateway.cors_allow_any);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await.map_err(GatewayError::Serve)
}

// --- Handlers ---

#[derive(Debug, Deserialize)]
struct ChatStreamParams {
    checkpoint_id: Option<String>,
}

async fn chat_stream_handler(
    State(ctx): State<Arc<AppContext>>,
    Path(message): Path<String>,
    Query(params): Query<ChatStreamParams>,
) -> Response {
    info!(
        message_len = message.len(),
        resumed = params.checkpoint_id.is_some(),
        "chat_stream request"
    );

    let rx = chat_stream::start(ctx, message, params.checkpoint_id);
    let frames = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(encode_frame(&event)));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    provider: String,
    checkpoint_backend: String,
    tools: Vec<String>,
}

async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: ctx.provider.name().to_string(),
        checkpoint_backend: ctx.checkpoints.name().to_string(),
        tools: ctx.tools.names().into_iter().map(String::from).collect(),
    })
}
