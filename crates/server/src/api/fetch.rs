//! Media fetch API handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use marquee_core::{EventEmitter, FetchRequest, VideoMetadata};

use super::middleware::AuthUser;
use crate::state::AppState;

/// Media type of the streamed event body.
pub const NDJSON: &str = "application/x-ndjson";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/fetch
///
/// Starts a fetch and streams its progress as newline-delimited JSON.
/// The response status is always 200; failures arrive as the final
/// `error` event.
pub async fn start_fetch(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<FetchRequest>,
) -> Response {
    let fetcher = state.fetcher();
    let (emitter, rx) = EventEmitter::channel(fetcher.channel_capacity());

    info!(user = %user, url = %request.url, verbose = request.verbose, "Fetch requested");

    tokio::spawn(async move {
        fetcher.run(request, emitter).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(event.to_ndjson()), rx))
    });

    (
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// POST /api/v1/fetch/probe
///
/// Reports what the tool knows about a URL without downloading it.
pub async fn probe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProbeRequest>,
) -> Result<Json<VideoMetadata>, (StatusCode, Json<ErrorResponse>)> {
    match state.fetcher().probe(&body.url).await {
        Ok(Some(metadata)) => Ok(Json(metadata)),
        Ok(None) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: "metadata unavailable".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.user_message(),
            }),
        )),
    }
}
