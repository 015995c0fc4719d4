//! HTTP API for the gist service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Accounts and sessions
//! - Uploads and their summarization
//! - Summaries and derived artifacts
//! - Settings

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, OptionalFromRequest, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{I18nError, ServiceError};
use crate::service::GistService;

pub mod accounts;
pub mod settings;
pub mod summaries;
pub mod uploads;

pub use accounts::CurrentUser;
use accounts::{login_handler, logout_handler, me_handler, register_handler};
use settings::{get_settings_handler, update_settings_handler};
use summaries::{
    audio_data_handler, export_pdf_handler, generate_qna_handler, get_summary_handler,
    list_qna_handler, list_summaries_handler, list_translations_handler, pdf_data_handler,
    synthesize_audio_handler, translate_handler,
};
use uploads::{
    create_upload_handler, delete_upload_handler, get_upload_handler, list_uploads_handler,
    summarize_handler, update_upload_handler, upload_file_handler,
};

/// Room for multipart framing and text fields on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<GistService>,
    pub start_time: Instant,
    /// Renders `/metrics` when a Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), "en")
    }
}

/// Response for operations that return only a confirmation
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// JSON body whose rejections render as `invalid_input` errors
pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = I18nError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<Arc<AppState>>>::from_request(req, state)
            .await
            .map_err(|rejection| {
                state.i18n_error(ServiceError::invalid(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                )))
            })?;
        Ok(Self(value))
    }
}

/// Absent body (no JSON content type) is `None`; a malformed one is rejected
impl<T> OptionalFromRequest<Arc<AppState>> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = I18nError;

    async fn from_request(
        req: Request,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        let value = <Json<T> as OptionalFromRequest<Arc<AppState>>>::from_request(req, state)
            .await
            .map_err(|rejection| {
                state.i18n_error(ServiceError::invalid(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                )))
            })?;
        Ok(value.map(|Json(value)| Self(value)))
    }
}

/// Build the API router
pub fn router(service: Arc<GistService>, metrics: Option<PrometheusHandle>) -> Router {
    let max_source_bytes = service.runtime_config.dynamic().extraction.max_source_bytes;
    let max_body_size = usize::try_from(max_source_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Model endpoints
        .route("/models", get(models_handler))
        // Account endpoints
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler))
        // Upload endpoints - raw files get a larger body limit
        .route(
            "/uploads",
            get(list_uploads_handler).post(create_upload_handler),
        )
        .route(
            "/uploads/file",
            post(upload_file_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route(
            "/uploads/{id}",
            get(get_upload_handler)
                .patch(update_upload_handler)
                .delete(delete_upload_handler),
        )
        .route("/summarize", post(summarize_handler))
        // Summary and derived artifact endpoints
        .route("/summaries", get(list_summaries_handler))
        .route("/summaries/{id}", get(get_summary_handler))
        .route(
            "/summaries/{id}/translations",
            get(list_translations_handler).post(translate_handler),
        )
        .route(
            "/summaries/{id}/qna",
            get(list_qna_handler).post(generate_qna_handler),
        )
        .route(
            "/summaries/{id}/audio",
            get(audio_data_handler).post(synthesize_audio_handler),
        )
        .route(
            "/summaries/{id}/pdf",
            get(pdf_data_handler).post(export_pdf_handler),
        )
        // Settings endpoints
        .route(
            "/settings",
            get(get_settings_handler).put(update_settings_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm_available = state.service.ollama.health_check().await;

    let status = if llm_available {
        state.service.i18n.get("en", "health-status-healthy", None)
    } else {
        state.service.i18n.format(
            "en",
            "health-status-degraded",
            &[("reason", "LLM endpoint unavailable")],
        )
    };

    Json(HealthResponse {
        status,
        healthy: llm_available,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        llm_available,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    llm_available: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// === Models ===

async fn models_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<Vec<crate::ollama::ModelInfo>>, I18nError> {
    let models = state
        .service
        .ollama
        .list_models()
        .await
        .map_err(|e| state.i18n_error(e.into()))?;
    Ok(Json(models))
}


#[cfg(test)]
mod tests {
    use super::test_support::{send, test_router};
    use super::*;

    #[tokio::test]
    async fn test_health_reports_degraded_llm() {
        let (_dir, _service, router) = test_router().await;
        let (status, body) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["llm_available"], false);
        assert_eq!(body["healthy"], false);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let (_dir, _service, router) = test_router().await;

        let (status, body) = send(&router, "GET", "/api/uploads", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&router, "GET", "/api/uploads", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_not_found() {
        let (_dir, _service, router) = test_router().await;
        let (status, _) = send(&router, "GET", "/metrics", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
