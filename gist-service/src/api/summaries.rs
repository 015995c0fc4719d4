//! Summary API endpoints and derived artifacts.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{QnaPair, Summary, SummaryOverview, Translation};
use crate::error::I18nError;
use crate::service::{ArtifactLocation, QnaResult, TranslationResult};

use super::{AppState, CurrentUser, ValidatedJson};

#[derive(Deserialize)]
pub struct TranslateRequest {
    pub language: String,
}

#[derive(Deserialize, Default)]
pub struct GenerateQnaRequest {
    pub num_questions: Option<usize>,
}

/// Created when generated now, OK when served from an earlier run
fn generated_status(cached: bool) -> StatusCode {
    if cached {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    }
}

pub async fn list_summaries_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<SummaryOverview>>, I18nError> {
    let summaries = state
        .service
        .list_summaries(user.id())
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(summaries))
}

pub async fn get_summary_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Summary>, I18nError> {
    let summary = state
        .service
        .get_summary(user.id(), &id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(summary))
}

pub async fn list_translations_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Translation>>, I18nError> {
    let translations = state
        .service
        .list_translations(user.id(), &id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(translations))
}

pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<TranslateRequest>,
) -> Result<(StatusCode, Json<TranslationResult>), I18nError> {
    let result = state
        .service
        .translate(user.id(), &id, &request.language)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((generated_status(result.cached), Json(result)))
}

pub async fn list_qna_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<QnaPair>>, I18nError> {
    let pairs = state
        .service
        .list_qna(user.id(), &id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(pairs))
}

/// Generate Q&A pairs; the body is optional
pub async fn generate_qna_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    request: Option<ValidatedJson<GenerateQnaRequest>>,
) -> Result<(StatusCode, Json<QnaResult>), I18nError> {
    let request = request.map(|ValidatedJson(request)| request).unwrap_or_default();
    let result = state
        .service
        .generate_qna(user.id(), &id, request.num_questions)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((generated_status(result.cached), Json(result)))
}

pub async fn synthesize_audio_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ArtifactLocation>), I18nError> {
    let result = state
        .service
        .synthesize_audio(user.id(), &id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((generated_status(result.cached), Json(result)))
}

pub async fn audio_data_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, I18nError> {
    let audio: Bytes = state
        .service
        .audio_data(user.id(), &id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

pub async fn export_pdf_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ArtifactLocation>), I18nError> {
    let result = state
        .service
        .export_pdf(user.id(), &id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((generated_status(result.cached), Json(result)))
}

pub async fn pdf_data_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, I18nError> {
    let pdf = state
        .service
        .pdf_data(user.id(), &id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"summary-{id}.pdf\""),
            ),
        ],
        pdf,
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, signed_in, test_router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;

    async fn summary_id(router: &axum::Router, token: &str) -> String {
        let (_, upload) = send(
            router,
            "POST",
            "/api/uploads",
            Some(token),
            Some(json!({ "kind": "web_link", "origin": "https://example.com/a", "file_name": "Article" })),
        )
        .await;
        let (_, summary) = send(
            router,
            "POST",
            "/api/summarize",
            Some(token),
            Some(json!({ "upload_id": upload["id"] })),
        )
        .await;
        summary["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_summaries_listing_and_ownership() {
        let (_dir, _service, router) = test_router().await;
        let alice = signed_in(&router, "alice@example.com").await;
        let bob = signed_in(&router, "bob@example.com").await;
        let id = summary_id(&router, &alice).await;

        let (status, listed) = send(&router, "GET", "/api/summaries", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], id.as_str());
        assert_eq!(listed[0]["upload_name"], "Article");
        assert_eq!(listed[0]["qna_count"], 0);

        let (_, listed) = send(&router, "GET", "/api/summaries", Some(&bob), None).await;
        assert!(listed.as_array().unwrap().is_empty());

        let uri = format!("/api/summaries/{id}");
        let (status, _) = send(&router, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&router, "GET", "/api/summaries/missing", Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsupported_language_is_bad_request() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;
        let id = summary_id(&router, &token).await;

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/summaries/{id}/translations"),
            Some(&token),
            Some(json!({ "language": "Klingon" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_pdf_export_and_download() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;
        let id = summary_id(&router, &token).await;
        let uri = format!("/api/summaries/{id}/pdf");

        let (status, _) = send(&router, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&router, "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["cached"], false);

        let (status, body) = send(&router, "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], true);

        let request = Request::builder()
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    }

    #[tokio::test]
    async fn test_qna_count_out_of_range() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;
        let id = summary_id(&router, &token).await;

        let (status, _) = send(
            &router,
            "POST",
            &format!("/api/summaries/{id}/qna"),
            Some(&token),
            Some(json!({ "num_questions": 21 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/summaries/{id}/qna"),
            Some(&token),
            Some(json!({ "num_questions": "five" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }
}
