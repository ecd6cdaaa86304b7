use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use picture_store::Database;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use vision_client::HttpImageAnnotator;

use crate::config::AppConfig;
use crate::handler::{HandleOutcome, HandlerError, UploadEvent, UploadHandler};

/// CloudEvent attributes every delivery must carry in binary content mode.
const REQUIRED_HEADERS: [&str; 5] = [
    "ce-id",
    "ce-source",
    "ce-type",
    "ce-specversion",
    "ce-subject",
];

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.db_url)
        .await
        .context("failed to open picture store")?;

    let annotator = HttpImageAnnotator::new(&config.vision_endpoint, config.vision_timeout)
        .context("failed to build annotation client")?;

    info!(
        vision_endpoint = %config.vision_endpoint,
        safety_policy = %config.analysis.safety_policy,
        storage_scheme = %config.analysis.storage_scheme,
        "upload handler configured"
    );

    let handler = UploadHandler::new(Arc::new(annotator), Arc::new(db), config.analysis.clone());
    let state = Arc::new(AppState { handler });

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listen socket")?;

    info!(addr = %config.listen_addr, "image-analysis listening");
    axum::serve(listener, app)
        .await
        .context("HTTP server exited")?;
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(healthz))
        .route("/start", get(start))
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState {
    pub handler: UploadHandler,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is healthy"))
)]
async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[utoipa::path(
    get,
    path = "/start",
    responses((status = 200, description = "Handler is ready to receive events", body = String))
)]
async fn start() -> &'static str {
    "image-analysis started"
}

#[utoipa::path(
    post,
    path = "/",
    request_body = UploadEvent,
    params(
        ("ce-id" = String, Header, description = "CloudEvent id"),
        ("ce-source" = String, Header, description = "CloudEvent source"),
        ("ce-type" = String, Header, description = "CloudEvent type"),
        ("ce-specversion" = String, Header, description = "CloudEvent spec version"),
        ("ce-subject" = String, Header, description = "Changed object, e.g. objects/cat.jpg")
    ),
    responses(
        (status = 200, description = "Event processed", body = EventResponse),
        (status = 400, description = "Missing CloudEvent header or bad event", body = ErrorBody),
        (status = 500, description = "Annotation or persistence failure", body = ErrorBody)
    )
)]
async fn receive_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventResponse>, ApiError> {
    for field in REQUIRED_HEADERS {
        if !headers.contains_key(field) {
            return Err(ApiError::bad_request(format!(
                "Missing expected header: {field}."
            )));
        }
    }

    let subject = headers
        .get("ce-subject")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let ce_id = headers
        .get("ce-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    info!(ce_id, subject, "detected change in storage bucket");

    let event: UploadEvent = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid event body: {err}")))?;

    let outcome = state.handler.handle(&event).await?;
    Ok(Json(EventResponse::from(outcome)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    /// `stored`, `skipped_unsafe` or `service_error`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<HandleOutcome> for EventResponse {
    fn from(outcome: HandleOutcome) -> Self {
        match outcome {
            HandleOutcome::Stored(_) => Self {
                outcome: "stored".into(),
                message: None,
            },
            HandleOutcome::SkippedUnsafe => Self {
                outcome: "skipped_unsafe".into(),
                message: None,
            },
            HandleOutcome::ServiceError { code, message } => Self {
                outcome: "service_error".into(),
                message: Some(format!("code {code}: {message}")),
            },
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::MalformedEvent(_) => ApiError::bad_request(err.to_string()),
            HandlerError::MissingColorData
            | HandlerError::Transport(_)
            | HandlerError::Store(_) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(status = %self.status, message = %self.message, "api error");
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
}

pub mod docs {
    use super::*;

    #[derive(OpenApi)]
    #[openapi(
        info(title = "Image Analysis API", version = "0.1.0"),
        paths(receive_event, healthz, start),
        components(schemas(UploadEvent, EventResponse, ErrorBody))
    )]
    pub struct ApiDoc;
}
