//! Upload CRUD and status operations.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{Upload, UploadKind, UploadStatus};
use crate::error::{DatabaseError, ServiceResult};

const UPLOAD_COLUMNS: &str = "u.id, u.owner_id, u.kind, u.origin, u.file_name, u.status, \
     u.last_error, u.created_at, u.updated_at, s.id";

/// Uploads repaired by startup recovery
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Had a summary, promoted to done
    pub completed: usize,
    /// Had no summary, marked failed
    pub failed: usize,
}

impl Database {
    /// Insert a new upload
    pub fn insert_upload(&self, upload: &Upload) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO uploads (id, owner_id, kind, origin, file_name, status, last_error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                upload.id,
                upload.owner_id,
                upload.kind.as_ref(),
                upload.origin,
                upload.file_name,
                upload.status.as_ref(),
                upload.last_error,
                upload.created_at.to_rfc3339(),
                upload.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get an upload by ID, with its summary id if one exists
    pub fn get_upload(&self, id: &str) -> ServiceResult<Option<Upload>> {
        let conn = self.conn()?;

        let upload = conn
            .query_row(
                &format!(
                    "SELECT {UPLOAD_COLUMNS} FROM uploads u \
                     LEFT JOIN summaries s ON s.upload_id = u.id WHERE u.id = ?1"
                ),
                params![id],
                Upload::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(upload)
    }

    /// List an owner's uploads newest first, optionally filtered
    pub fn list_uploads(
        &self,
        owner_id: &str,
        status: Option<UploadStatus>,
        kind: Option<UploadKind>,
    ) -> ServiceResult<Vec<Upload>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {UPLOAD_COLUMNS} FROM uploads u \
                 LEFT JOIN summaries s ON s.upload_id = u.id \
                 WHERE u.owner_id = ?1 \
                   AND (?2 IS NULL OR u.status = ?2) \
                   AND (?3 IS NULL OR u.kind = ?3) \
                 ORDER BY u.created_at DESC, u.rowid DESC"
            ))
            .map_err(DatabaseError::Query)?;

        let uploads = stmt
            .query_map(
                params![
                    owner_id,
                    status.as_ref().map(AsRef::<str>::as_ref),
                    kind.as_ref().map(AsRef::<str>::as_ref),
                ],
                Upload::from_row,
            )
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(uploads)
    }

    /// Write a status and its error detail. `None` clears the error.
    ///
    /// Returns false when the upload does not exist.
    pub fn set_upload_status(
        &self,
        id: &str,
        status: UploadStatus,
        last_error: Option<&str>,
    ) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let updated = conn
            .execute(
                "UPDATE uploads SET status = ?1, last_error = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_ref(), last_error, Utc::now().to_rfc3339(), id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated > 0)
    }

    /// Delete an upload (summary, translations and Q&A cascade)
    pub fn delete_upload(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let deleted = conn
            .execute("DELETE FROM uploads WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(deleted > 0)
    }

    /// Repair uploads left in `processing` by an interrupted run.
    ///
    /// Uploads that already have a summary become `done`; the rest become
    /// `failed` with `message` as their error.
    pub fn recover_interrupted_uploads(&self, message: &str) -> ServiceResult<RecoveryReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = Utc::now().to_rfc3339();

        let completed = tx
            .execute(
                "UPDATE uploads SET status = 'done', last_error = NULL, updated_at = ?1 \
                 WHERE status = 'processing' \
                   AND EXISTS (SELECT 1 FROM summaries s WHERE s.upload_id = uploads.id)",
                params![now],
            )
            .map_err(DatabaseError::Query)?;

        let failed = tx
            .execute(
                "UPDATE uploads SET status = 'failed', last_error = ?1, updated_at = ?2 \
                 WHERE status = 'processing'",
                params![message, now],
            )
            .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(RecoveryReport { completed, failed })
    }
}
