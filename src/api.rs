//! HTTP surface for docchunk.
//!
//! The router exposes the document pipeline as multipart upload endpoints:
//!
//! - `POST /api/process` – One chunk per document element, with optional table and image lists.
//!   Form fields: `file`, `extract_tables` (true), `extract_images` (false), `do_ocr` (true).
//! - `POST /api/process-rag` – Token-bounded chunks for retrieval. Form fields: `file`,
//!   `chunk_size` (512), `chunk_overlap` (50), `merge_peers` (true).
//! - `POST /api/extract-tables` – Tables only, in page order.
//! - `POST /api/process-excel` – One chunk per row of the first worksheet (`.xlsx`/`.xls`).
//! - `GET /`, `GET /health`, `GET /metrics` – Service descriptor, readiness and counters.
//!
//! Upload routes require the `X-API-Key` header when a key is configured. Every response body
//! carries `success`; failures add an `error` message.

mod auth;
mod form;

pub use auth::API_KEY_HEADER;

use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingApi, ProcessingError, ValidationError};
use auth::{ApiKeyGuard, require_api_key};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use form::UploadForm;
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Room for form fields and multipart framing on top of the file cap.
const BODY_LIMIT_SLACK_BYTES: usize = 1024 * 1024;

struct ApiState<S> {
    service: Arc<S>,
    max_upload_mb: f64,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            max_upload_mb: self.max_upload_mb,
        }
    }
}

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>, config: &Config) -> Router
where
    S: ProcessingApi + 'static,
{
    let guard = ApiKeyGuard::new(config.api_key.as_deref());
    let uploads = Router::new()
        .route("/api/process", post(process_document::<S>))
        .route("/api/process-rag", post(process_rag::<S>))
        .route("/api/extract-tables", post(extract_tables::<S>))
        .route("/api/process-excel", post(process_spreadsheet::<S>))
        .layer(DefaultBodyLimit::max(body_limit_bytes(config.max_upload_mb)))
        .layer(middleware::from_fn_with_state(guard, require_api_key));

    Router::new()
        .route("/", get(service_descriptor::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .merge(uploads)
        .layer(cors_layer(config.cors_allow_origins.as_deref()))
        .with_state(ApiState {
            service,
            max_upload_mb: config.max_upload_mb,
        })
}

fn body_limit_bytes(max_upload_mb: f64) -> usize {
    (max_upload_mb * 1024.0 * 1024.0).ceil() as usize + BODY_LIMIT_SLACK_BYTES
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Describe the service and its endpoints.
async fn service_descriptor<S>(State(state): State<ApiState<S>>) -> Json<Value>
where
    S: ProcessingApi,
{
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.service.backend_name(),
        "endpoints": {
            "health": "GET /health",
            "metrics": "GET /metrics",
            "process": "POST /api/process",
            "process_rag": "POST /api/process-rag",
            "extract_tables": "POST /api/extract-tables",
            "process_excel": "POST /api/process-excel"
        }
    }))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    converter_ready: bool,
}

async fn health<S>(State(state): State<ApiState<S>>) -> Json<HealthResponse>
where
    S: ProcessingApi,
{
    Json(HealthResponse {
        status: "ok",
        converter_ready: state.service.converter_ready(),
    })
}

/// Return the processing counters accumulated since startup.
async fn get_metrics<S>(State(state): State<ApiState<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(state.service.metrics_snapshot())
}

async fn process_document<S>(
    State(state): State<ApiState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: ProcessingApi + 'static,
{
    handle_upload(state, multipart, "process", |service, form| async move {
        let options = form.process_options()?;
        service.process_document(form.file, options).await
    })
    .await
}

async fn process_rag<S>(
    State(state): State<ApiState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: ProcessingApi + 'static,
{
    handle_upload(state, multipart, "process-rag", |service, form| async move {
        let options = form.rag_options()?;
        service.process_rag(form.file, options).await
    })
    .await
}

async fn extract_tables<S>(
    State(state): State<ApiState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: ProcessingApi + 'static,
{
    handle_upload(state, multipart, "extract-tables", |service, form| async move {
        service.extract_tables(form.file).await
    })
    .await
}

async fn process_spreadsheet<S>(
    State(state): State<ApiState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: ProcessingApi + 'static,
{
    handle_upload(state, multipart, "process-excel", |service, form| async move {
        service.process_spreadsheet(form.file).await
    })
    .await
}

/// Decode the form and run one pipeline operation inside a per-request span.
async fn handle_upload<S, T, F, Fut>(
    state: ApiState<S>,
    multipart: Result<Multipart, MultipartRejection>,
    endpoint: &'static str,
    run: F,
) -> Result<Response, AppError>
where
    S: ProcessingApi + 'static,
    T: Serialize,
    F: FnOnce(Arc<S>, UploadForm) -> Fut,
    Fut: Future<Output = Result<T, ProcessingError>>,
{
    let span = tracing::info_span!(
        "upload",
        request_id = %Uuid::new_v4(),
        endpoint,
        filename = tracing::field::Empty
    );
    async move {
        let multipart =
            multipart.map_err(|rejection| ValidationError::Multipart(rejection.body_text()))?;
        let form = UploadForm::read(multipart, state.max_upload_mb).await?;
        tracing::Span::current().record("filename", form.file.filename.as_str());
        tracing::info!(size_mb = form.file.rounded_size_mb(), "Received upload");

        let body = run(state.service, form).await?;
        Ok::<_, AppError>(Json(body).into_response())
    }
    .instrument(span)
    .await
}

/// Build the JSON error body shared by every failure path.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "success": false,
        "error": message.into(),
    });
    (status, Json(body)).into_response()
}

struct AppError(ProcessingError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self.0, "Request rejected");
        }
        error_response(status, self.0.to_string())
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self(inner)
    }
}

impl From<ValidationError> for AppError {
    fn from(inner: ValidationError) -> Self {
        Self(inner.into())
    }
}
