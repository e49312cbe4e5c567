//! Jobs Router - HTTP endpoints for submitting and polling jobs
//!
//! Merge this at the root of the service router:
//! ```ignore
//! use tfaas_http::prelude::*;
//! use tfaas_jobs::router::{create_router, JobsState};
//!
//! let router = RouterBuilder::new()
//!     .merge("jobs", create_router(JobsState::new(engine)))
//!     .build();
//! ```
//!
//! | route | success | rejection |
//! |---|---|---|
//! | `POST /apply`, `POST /destroy` | `202 {"request_id"}` | `400` empty, `503` empty |
//! | `GET /job/:id` | `200` status body | `404` empty |
//! | `GET /metrics` | prometheus text | `500` |

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::engine::JobEngine;
use crate::error::JobError;
use crate::job::{Action, Job};

/// Jobs service state
#[derive(Clone)]
pub struct JobsState {
    pub engine: JobEngine,
}

impl JobsState {
    pub fn new(engine: JobEngine) -> Self {
        Self { engine }
    }
}

/// Body of `POST /apply` and `POST /destroy`
#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub version: String,
}

/// Body of `GET /job/:id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    pub path: String,
    pub version: String,
    pub error: String,
    pub status: String,
    pub action: String,
    pub request_id: String,
}

impl From<&Job> for StatusBody {
    fn from(job: &Job) -> Self {
        Self {
            path: job.path.clone(),
            version: job.version.clone(),
            error: job.failure.clone(),
            status: job.status.to_string(),
            action: job.action.to_string(),
            request_id: job.id.to_string(),
        }
    }
}

pub fn create_router(state: JobsState) -> Router {
    Router::new()
        .route("/apply", post(apply_handler))
        .route("/destroy", post(destroy_handler))
        .route("/job/:id", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// === Handlers ===

async fn apply_handler(State(state): State<JobsState>, body: Bytes) -> Response {
    submit(&state, Action::Apply, &body).await
}

async fn destroy_handler(State(state): State<JobsState>, body: Bytes) -> Response {
    submit(&state, Action::Destroy, &body).await
}

async fn submit(state: &JobsState, action: Action, body: &[u8]) -> Response {
    // Read the raw body so a missing Content-Type is not a rejection
    let body: SubmitBody = match serde_json::from_slice(body) {
        Ok(body) => body,
        Err(e) => {
            warn!(action = %action, error = %e, "Unreadable submission body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state
        .engine
        .submit(&body.version, action.as_str(), &body.path)
        .await
    {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "request_id": id.to_string() })),
        )
            .into_response(),
        Err(JobError::BadRequest(reason)) => {
            warn!(action = %action, reason = %reason, "Bad submission");
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(JobError::Busy { running }) => {
            warn!(action = %action, running = %running, "Server busy");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn status_handler(State(state): State<JobsState>, Path(id): Path<String>) -> Response {
    match state.engine.status(&id).await {
        Some(job) => Json(StatusBody::from(&job)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn metrics_handler(State(state): State<JobsState>) -> Response {
    match state.engine.metrics().render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
