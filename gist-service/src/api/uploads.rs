//! Upload API endpoints.
//!
//! Handlers for creating uploads from links or raw files, listing,
//! status correction, deletion, and summarization.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{Summary, Upload};
use crate::error::{I18nError, ServiceError};

use super::{AppState, CurrentUser, MessageResponse, ValidatedJson};

#[derive(Deserialize)]
pub struct ListUploadsParams {
    pub status: Option<String>,
    pub kind: Option<String>,
}

/// Request to register an upload from a link
#[derive(Deserialize)]
pub struct CreateUploadRequest {
    pub kind: String,
    pub origin: String,
    pub file_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUploadRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub upload_id: String,
}

pub async fn list_uploads_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<ListUploadsParams>,
) -> Result<Json<Vec<Upload>>, I18nError> {
    let uploads = state
        .service
        .list_uploads(user.id(), params.status.as_deref(), params.kind.as_deref())
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(uploads))
}

pub async fn create_upload_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateUploadRequest>,
) -> Result<(StatusCode, Json<Upload>), I18nError> {
    let upload = state
        .service
        .create_upload(user.id(), &request.kind, &request.origin, request.file_name)
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(upload)))
}

/// Upload a raw document or audio file (multipart fields `kind` and `file`)
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Upload>), I18nError> {
    let mut file_data: Option<(Bytes, String)> = None;
    let mut kind: Option<String> = None;

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            state.i18n_error(ServiceError::invalid(e.body_text()))
        })?;
        let Some(field) = field else {
            break;
        };

        match field.name().unwrap_or("") {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| state.i18n_error(ServiceError::invalid(e.body_text())))?;
                file_data = Some((data, file_name));
            }
            "kind" => {
                kind = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| state.i18n_error(ServiceError::invalid(e.body_text())))?,
                );
            }
            _ => {}
        }
    }

    let (data, file_name) = file_data
        .ok_or_else(|| state.i18n_error(ServiceError::invalid("file field is required")))?;
    let kind = kind.ok_or_else(|| state.i18n_error(ServiceError::invalid("kind field is required")))?;

    let upload = state
        .service
        .upload_file(user.id(), &kind, &file_name, data)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(upload)))
}

pub async fn get_upload_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Upload>, I18nError> {
    let upload = state
        .service
        .get_upload(user.id(), &id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(upload))
}

pub async fn update_upload_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateUploadRequest>,
) -> Result<Json<Upload>, I18nError> {
    let upload = state
        .service
        .update_status(user.id(), &id, &request.status)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(upload))
}

pub async fn delete_upload_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, I18nError> {
    state
        .service
        .delete_upload(user.id(), &id)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(MessageResponse {
        success: true,
        message: state.service.i18n.get("en", "upload-deleted", None),
    }))
}

/// Extract and summarize an upload
pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<SummarizeRequest>,
) -> Result<(StatusCode, Json<Summary>), I18nError> {
    let summary = state
        .service
        .summarize_upload(user.id(), &request.upload_id)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, signed_in, test_router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_create_summarize_and_rerun() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (status, upload) = send(
            &router,
            "POST",
            "/api/uploads",
            Some(&token),
            Some(json!({ "kind": "web_link", "origin": "https://example.com/post" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(upload["status"], "pending");
        let upload_id = upload["id"].as_str().unwrap();

        let (status, summary) = send(
            &router,
            "POST",
            "/api/summarize",
            Some(&token),
            Some(json!({ "upload_id": upload_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(summary["text"], "A short summary.");

        let (status, body) = send(
            &router,
            "POST",
            "/api/summarize",
            Some(&token),
            Some(json!({ "upload_id": upload_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_processed");

        let (status, fetched) =
            send(&router, "GET", &format!("/api/uploads/{upload_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["status"], "done");
        assert_eq!(fetched["summary_id"], summary["id"]);
    }

    #[tokio::test]
    async fn test_other_owner_is_forbidden() {
        let (_dir, _service, router) = test_router().await;
        let alice = signed_in(&router, "alice@example.com").await;
        let bob = signed_in(&router, "bob@example.com").await;

        let (_, upload) = send(
            &router,
            "POST",
            "/api/uploads",
            Some(&alice),
            Some(json!({ "kind": "video", "origin": "https://youtu.be/dQw4w9WgXcQ" })),
        )
        .await;
        let uri = format!("/api/uploads/{}", upload["id"].as_str().unwrap());

        let (status, body) = send(&router, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, _) = send(&router, "DELETE", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, "DELETE", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_disabled_video_is_service_unavailable() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (_, upload) = send(
            &router,
            "POST",
            "/api/uploads",
            Some(&token),
            Some(json!({ "kind": "video", "origin": "https://youtu.be/dQw4w9WgXcQ" })),
        )
        .await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/summarize",
            Some(&token),
            Some(json!({ "upload_id": upload["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (_, listed) =
            send(&router, "GET", "/api/uploads?status=pending", Some(&token), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_upload_id_is_bad_request() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (status, body) =
            send(&router, "POST", "/api/summarize", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_invalid_input() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/uploads",
            Some(&token),
            Some(json!({ "origin": "https://example.com/post" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");

        let (status, body) = send(
            &router,
            "POST",
            "/api/summarize",
            Some(&token),
            Some(json!({ "upload_id": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");

        let (_, upload) = send(
            &router,
            "POST",
            "/api/uploads",
            Some(&token),
            Some(json!({ "kind": "web_link", "origin": "https://example.com/post" })),
        )
        .await;
        let uri = format!("/api/uploads/{}", upload["id"].as_str().unwrap());
        let (status, body) = send(&router, "PATCH", &uri, Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_multipart_file_upload() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let boundary = "gistboundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"kind\"\r\n\r\ndocument\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nSome notes\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/uploads/file")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let upload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(upload["kind"], "document");
        assert_eq!(upload["file_name"], "notes.txt");
        assert!(upload["origin"].as_str().unwrap().starts_with("storage://uploads/"));
    }
}
