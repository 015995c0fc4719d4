//! Upload store operations exposed to callers.

use bytes::Bytes;
use std::str::FromStr;
use tracing::{info, warn};

use super::GistService;
use crate::db::{Upload, UploadKind, UploadStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{key_from_location, sanitize_file_name};

/// Parse a wire-format upload kind (`document`, `audio`, `video`, `web_link`)
pub fn parse_kind(kind: &str) -> ServiceResult<UploadKind> {
    UploadKind::from_str(kind.trim())
        .map_err(|_| ServiceError::invalid(format!("unsupported upload kind: {kind}")))
}

/// Parse a wire-format upload status
pub fn parse_status(status: &str) -> ServiceResult<UploadStatus> {
    UploadStatus::from_str(status.trim())
        .map_err(|_| ServiceError::invalid(format!("unknown upload status: {status}")))
}

fn require_http_url(origin: &str) -> ServiceResult<()> {
    match reqwest::Url::parse(origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ServiceError::invalid(format!(
            "origin must be an http(s) URL: {origin}"
        ))),
    }
}

impl GistService {
    /// Register an upload whose content lives at a URL
    pub fn create_upload(
        &self,
        owner: &str,
        kind: &str,
        origin: &str,
        file_name: Option<String>,
    ) -> ServiceResult<Upload> {
        let kind = parse_kind(kind)?;

        let origin = origin.trim();
        if origin.is_empty() {
            return Err(ServiceError::invalid("origin is required"));
        }
        // Storage pointers are only minted by upload_file
        require_http_url(origin)?;

        let file_name = file_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let upload = Upload::new(owner, kind, origin, file_name);
        self.db.insert_upload(&upload)?;

        info!(upload_id = %upload.id, kind = %kind, "Upload created");
        Ok(upload)
    }

    /// Store a raw file and register it as an upload
    pub async fn upload_file(
        &self,
        owner: &str,
        kind: &str,
        file_name: &str,
        data: Bytes,
    ) -> ServiceResult<Upload> {
        let kind = parse_kind(kind)?;
        if !kind.accepts_file() {
            return Err(ServiceError::invalid(format!(
                "{kind} uploads must be created from a link"
            )));
        }
        if data.is_empty() {
            return Err(ServiceError::invalid("file is empty"));
        }

        let max_bytes = self.runtime_config.dynamic().extraction.max_source_bytes;
        if data.len() as u64 > max_bytes {
            return Err(ServiceError::invalid(format!(
                "file is too large: {} bytes (max {max_bytes} bytes)",
                data.len()
            )));
        }

        let key = format!(
            "uploads/{owner}/{}-{}",
            uuid::Uuid::new_v4(),
            sanitize_file_name(file_name)
        );
        let size = data.len();
        let location = self.storage.put(&key, data).await?;

        let display_name = file_name.trim();
        let upload = Upload::new(
            owner,
            kind,
            location,
            (!display_name.is_empty()).then(|| display_name.to_string()),
        );

        if let Err(e) = self.db.insert_upload(&upload) {
            if let Err(cleanup) = self.storage.delete(&key).await {
                warn!(key = %key, error = %cleanup, "Failed to remove orphaned upload file");
            }
            return Err(e);
        }

        info!(upload_id = %upload.id, kind = %kind, size_bytes = size, "File uploaded");
        Ok(upload)
    }

    /// List the caller's uploads, newest first
    pub fn list_uploads(
        &self,
        owner: &str,
        status: Option<&str>,
        kind: Option<&str>,
    ) -> ServiceResult<Vec<Upload>> {
        let status = status.map(parse_status).transpose()?;
        let kind = kind.map(parse_kind).transpose()?;
        self.db.list_uploads(owner, status, kind)
    }

    pub fn get_upload(&self, owner: &str, upload_id: &str) -> ServiceResult<Upload> {
        self.owned_upload(owner, upload_id)
    }

    /// Administrative status correction.
    ///
    /// `done` requires an existing summary, and an upload with a summary
    /// can only be `done`. `processing` belongs to the pipeline and cannot
    /// be set by hand.
    pub fn update_status(&self, owner: &str, upload_id: &str, status: &str) -> ServiceResult<Upload> {
        let status = parse_status(status)?;
        let upload = self.owned_upload(owner, upload_id)?;

        let last_error = match status {
            UploadStatus::Processing => {
                return Err(ServiceError::invalid(
                    "processing is set by the summarize operation",
                ));
            }
            UploadStatus::Done if upload.summary_id.is_none() => {
                return Err(ServiceError::invalid(
                    "an upload can only be marked done once it has a summary",
                ));
            }
            UploadStatus::Pending | UploadStatus::Failed if upload.summary_id.is_some() => {
                return Err(ServiceError::invalid(
                    "an upload with a summary can only be marked done",
                ));
            }
            UploadStatus::Failed => Some(
                upload
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "marked as failed".to_string()),
            ),
            UploadStatus::Pending | UploadStatus::Done => None,
        };

        if !self
            .db
            .set_upload_status(upload_id, status, last_error.as_deref())?
        {
            return Err(ServiceError::not_found("upload", upload_id));
        }
        info!(upload_id = %upload_id, status = %status, "Upload status updated");

        self.owned_upload(owner, upload_id)
    }

    /// Delete an upload with its summary and derived artifacts.
    ///
    /// Stored files are removed best-effort after the rows are gone.
    pub async fn delete_upload(&self, owner: &str, upload_id: &str) -> ServiceResult<()> {
        let upload = self.owned_upload(owner, upload_id)?;
        let summary = self.db.get_summary_for_upload(upload_id)?;

        if !self.db.delete_upload(upload_id)? {
            return Err(ServiceError::not_found("upload", upload_id));
        }
        info!(upload_id = %upload_id, "Upload deleted");

        let mut locations = vec![upload.origin];
        if let Some(summary) = summary {
            locations.extend(summary.audio_location);
            locations.extend(summary.pdf_location);
        }

        for location in &locations {
            let Some(key) = key_from_location(location) else {
                continue;
            };
            if let Err(e) = self.storage.delete(key).await {
                warn!(upload_id = %upload_id, key = %key, error = %e, "Failed to delete stored file");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Summary;
    use crate::service::test_support::test_service;

    #[tokio::test]
    async fn test_create_upload_validates_kind_and_origin() {
        let (_dir, service) = test_service().await;

        let upload = service
            .create_upload("alice", "web_link", " https://example.com/post ", None)
            .unwrap();
        assert_eq!(upload.kind, UploadKind::WebLink);
        assert_eq!(upload.origin, "https://example.com/post");
        assert_eq!(upload.status, UploadStatus::Pending);

        for (kind, origin) in [
            ("spreadsheet", "https://example.com"),
            ("video", ""),
            ("video", "ftp://example.com/v"),
            ("document", "storage://uploads/bob/secret.pdf"),
        ] {
            assert!(
                matches!(
                    service.create_upload("alice", kind, origin, None),
                    Err(ServiceError::InvalidInput { .. })
                ),
                "{kind} {origin}"
            );
        }
    }

    #[tokio::test]
    async fn test_upload_file_stores_bytes() {
        let (_dir, service) = test_service().await;

        let upload = service
            .upload_file("alice", "document", "../notes.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert!(upload.origin.starts_with("storage://uploads/alice/"));
        assert!(upload.origin.ends_with("-notes.txt"));
        assert_eq!(upload.file_name.as_deref(), Some("../notes.txt"));

        let key = key_from_location(&upload.origin).unwrap();
        assert_eq!(service.storage.get(key).await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_upload_file_rejects_links_and_empty_files() {
        let (_dir, service) = test_service().await;

        assert!(matches!(
            service
                .upload_file("alice", "web_link", "page.html", Bytes::from_static(b"x"))
                .await,
            Err(ServiceError::InvalidInput { .. })
        ));
        assert!(matches!(
            service
                .upload_file("alice", "audio", "a.mp3", Bytes::new())
                .await,
            Err(ServiceError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_uploads_filters() {
        let (_dir, service) = test_service().await;
        service
            .create_upload("alice", "web_link", "https://a.example", None)
            .unwrap();
        service
            .create_upload("alice", "video", "https://youtu.be/dQw4w9WgXcQ", None)
            .unwrap();
        service
            .create_upload("bob", "web_link", "https://b.example", None)
            .unwrap();

        assert_eq!(service.list_uploads("alice", None, None).unwrap().len(), 2);
        assert_eq!(
            service
                .list_uploads("alice", Some("pending"), Some("video"))
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            service.list_uploads("alice", Some("stuck"), None),
            Err(ServiceError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_status_rules() {
        let (_dir, service) = test_service().await;
        let upload = service
            .create_upload("alice", "web_link", "https://a.example", None)
            .unwrap();

        assert!(matches!(
            service.update_status("alice", &upload.id, "done"),
            Err(ServiceError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.update_status("alice", &upload.id, "processing"),
            Err(ServiceError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.update_status("bob", &upload.id, "failed"),
            Err(ServiceError::Forbidden { .. })
        ));

        let failed = service.update_status("alice", &upload.id, "failed").unwrap();
        assert_eq!(failed.status, UploadStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("marked as failed"));

        let pending = service.update_status("alice", &upload.id, "pending").unwrap();
        assert_eq!(pending.status, UploadStatus::Pending);
        assert!(pending.last_error.is_none());

        service.summarize_upload("alice", &upload.id).await.unwrap();
        let done = service.update_status("alice", &upload.id, "done").unwrap();
        assert_eq!(done.status, UploadStatus::Done);

        for status in ["failed", "pending"] {
            assert!(matches!(
                service.update_status("alice", &upload.id, status),
                Err(ServiceError::InvalidInput { .. })
            ));
        }
        let stored = service.get_upload("alice", &upload.id).unwrap();
        assert_eq!(stored.status, UploadStatus::Done);
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn test_delete_upload_removes_rows_and_files() {
        let (_dir, service) = test_service().await;
        let upload = service
            .upload_file("alice", "document", "notes.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let summary: Summary = service.summarize_upload("alice", &upload.id).await.unwrap();

        assert!(matches!(
            service.delete_upload("bob", &upload.id).await,
            Err(ServiceError::Forbidden { .. })
        ));

        service.delete_upload("alice", &upload.id).await.unwrap();
        assert!(service.db.get_upload(&upload.id).unwrap().is_none());
        assert!(service.db.get_summary(&summary.id).unwrap().is_none());

        let key = key_from_location(&upload.origin).unwrap();
        assert!(service.storage.get(key).await.is_err());
    }
}
