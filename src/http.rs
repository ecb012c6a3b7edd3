//! HTTP surface of the report service.
//!
//! `GET /pdf/:id` streams the registration report.  The record lookup, photo
//! fetching and the page-counting pass all happen before the response head is
//! sent, so a missing record answers 404 and a layout failure answers 500 with
//! a JSON body.  Once streaming has begun, a failure ends the body with an
//! error and the connection is aborted.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, warn};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use crate::report::ReportRenderer;
use crate::sink::ChannelSink;

/// Chunks buffered between the renderer and the response body.
const STREAM_CHANNEL_CAPACITY: usize = 8;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    renderer: Arc<ReportRenderer>,
    started: Instant,
}

impl AppState {
    pub fn new(renderer: Arc<ReportRenderer>) -> Self {
        Self {
            renderer,
            started: Instant::now(),
        }
    }

    pub fn renderer(&self) -> &ReportRenderer {
        &self.renderer
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route("/ping", get(ping_handler))
        .route("/pdf/:id", get(report_handler))
        .with_state(state)
}

/// File name offered for a driver's report.
///
/// Characters other than ASCII letters, digits, `_` and whitespace are
/// dropped, then each whitespace run becomes a single `_`.
pub fn attachment_filename(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                stem.push('_');
            }
            in_space = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            stem.push(c);
            in_space = false;
        }
    }
    format!("Registration_{}.pdf", stem)
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(json!({"error": message.into()}));
    (status, body).into_response()
}

async fn landing_handler() -> Json<serde_json::Value> {
    Json(json!({"message": "server running"}))
}

async fn ping_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "pong",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

async fn report_handler(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let Ok(id) = raw_id.trim().parse::<i64>() else {
        return json_error(
            StatusCode::BAD_REQUEST,
            format!("invalid registration id: {}", raw_id),
        );
    };

    let prepared = match state.renderer.prepare(id).await {
        Ok(prepared) => prepared,
        Err(err) if err.is_not_found() => {
            debug!("report requested for unknown registration {}", id);
            return json_error(StatusCode::NOT_FOUND, err.to_string());
        }
        Err(err) => {
            error!("failed to prepare report {}: {}", id, err);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_filename(prepared.record().name())
    );
    let (mut sink, rx) = ChannelSink::channel(STREAM_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || match prepared.write_to(&mut sink) {
        Ok(summary) => debug!(
            "streamed report {} ({} bytes)",
            summary.record_id, summary.bytes_written
        ),
        Err(err) if err.is_sink_failure() => {
            warn!("client stopped reading report {}: {}", id, err);
        }
        Err(err) => {
            error!("failed to render report {}: {}", id, err);
            sink.abort(err.to_string());
        }
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}
