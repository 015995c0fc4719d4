//! Summary persistence, including the atomic completion of an upload.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::models::{Summary, SummaryOverview, UploadKind};
use super::{Database, is_foreign_key_violation, is_unique_violation};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

const SUMMARY_COLUMNS: &str = "id, owner_id, upload_id, text, audio_location, pdf_location, created_at";

impl Database {
    /// Persist a summary and flip its upload to `done` in one transaction.
    ///
    /// The UNIQUE constraint on `summaries.upload_id` decides races: a second
    /// summary for the same upload is rejected as `AlreadyProcessed`.
    pub fn complete_upload(&self, summary: &Summary) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let inserted = tx.execute(
            &format!(
                "INSERT INTO summaries ({SUMMARY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                summary.id,
                summary.owner_id,
                summary.upload_id,
                summary.text,
                summary.audio_location,
                summary.pdf_location,
                summary.created_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::AlreadyProcessed {
                    upload_id: summary.upload_id.clone(),
                });
            }
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(ServiceError::not_found("upload", summary.upload_id.clone()));
            }
            Err(e) => return Err(DatabaseError::Query(e).into()),
        }

        tx.execute(
            "UPDATE uploads SET status = 'done', last_error = NULL, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), summary.upload_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Get a summary by ID
    pub fn get_summary(&self, id: &str) -> ServiceResult<Option<Summary>> {
        let conn = self.conn()?;

        let summary = conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM summaries WHERE id = ?1"),
                params![id],
                Summary::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(summary)
    }

    /// Get the summary produced for an upload, if any
    pub fn get_summary_for_upload(&self, upload_id: &str) -> ServiceResult<Option<Summary>> {
        let conn = self.conn()?;

        let summary = conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM summaries WHERE upload_id = ?1"),
                params![upload_id],
                Summary::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(summary)
    }

    /// List an owner's summaries newest first with upload and artifact details
    pub fn list_summaries(&self, owner_id: &str) -> ServiceResult<Vec<SummaryOverview>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.owner_id, s.upload_id, s.text, s.audio_location, s.pdf_location, \
                        s.created_at, u.kind, COALESCE(u.file_name, u.origin), \
                        (SELECT COUNT(*) FROM qna_pairs q WHERE q.summary_id = s.id) \
                 FROM summaries s JOIN uploads u ON u.id = s.upload_id \
                 WHERE s.owner_id = ?1 \
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![owner_id], |row| {
                let kind: String = row.get(7)?;
                let upload_kind = kind.parse::<UploadKind>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        7,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let qna_count: i64 = row.get(9)?;

                Ok(SummaryOverview {
                    summary: Summary::from_row(row)?,
                    upload_kind,
                    upload_name: row.get(8)?,
                    translation_languages: Vec::new(),
                    qna_count: qna_count as usize,
                })
            })
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        drop(stmt);

        let mut lang_stmt = conn
            .prepare("SELECT language FROM translations WHERE summary_id = ?1 ORDER BY language")
            .map_err(DatabaseError::Query)?;

        let mut overviews = rows;
        for overview in &mut overviews {
            overview.translation_languages = lang_stmt
                .query_map(params![overview.summary.id], |row| row.get(0))
                .map_err(DatabaseError::Query)?
                .collect::<Result<Vec<String>, _>>()
                .map_err(DatabaseError::Query)?;
        }

        Ok(overviews)
    }

    /// Attach the stored location of the synthesized audio
    pub fn set_summary_audio_location(&self, id: &str, location: &str) -> ServiceResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE summaries SET audio_location = ?1 WHERE id = ?2",
            params![location, id],
        )
        .map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Attach the stored location of the exported PDF
    pub fn set_summary_pdf_location(&self, id: &str, location: &str) -> ServiceResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE summaries SET pdf_location = ?1 WHERE id = ?2",
            params![location, id],
        )
        .map_err(DatabaseError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Upload, UploadStatus};

    fn inserted_upload(db: &Database) -> Upload {
        let upload = Upload::new("alice", UploadKind::Document, "storage://a.txt", Some("a.txt".into()));
        db.insert_upload(&upload).unwrap();
        db.set_upload_status(&upload.id, UploadStatus::Processing, None)
            .unwrap();
        upload
    }

    #[test]
    fn test_complete_upload_writes_summary_and_status() {
        let db = Database::open_in_memory().unwrap();
        let upload = inserted_upload(&db);
        let summary = Summary::new(&upload, "short");

        db.complete_upload(&summary).unwrap();

        let loaded = db.get_upload(&upload.id).unwrap().unwrap();
        assert_eq!(loaded.status, UploadStatus::Done);
        assert_eq!(loaded.summary_id.as_deref(), Some(summary.id.as_str()));
        assert_eq!(
            db.get_summary_for_upload(&upload.id).unwrap().unwrap().text,
            "short"
        );
    }

    #[test]
    fn test_second_summary_is_already_processed() {
        let db = Database::open_in_memory().unwrap();
        let upload = inserted_upload(&db);
        db.complete_upload(&Summary::new(&upload, "first")).unwrap();

        let err = db
            .complete_upload(&Summary::new(&upload, "second"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyProcessed { .. }));

        // Original summary untouched
        assert_eq!(
            db.get_summary_for_upload(&upload.id).unwrap().unwrap().text,
            "first"
        );
    }

    #[test]
    fn test_complete_missing_upload_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let ghost = Upload::new("alice", UploadKind::Document, "storage://x", None);
        let err = db.complete_upload(&Summary::new(&ghost, "text")).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[test]
    fn test_delete_upload_cascades_to_summary() {
        let db = Database::open_in_memory().unwrap();
        let upload = inserted_upload(&db);
        let summary = Summary::new(&upload, "short");
        db.complete_upload(&summary).unwrap();

        assert!(db.delete_upload(&upload.id).unwrap());
        assert!(db.get_summary(&summary.id).unwrap().is_none());
    }

    #[test]
    fn test_list_summaries_includes_details() {
        let db = Database::open_in_memory().unwrap();
        let upload = inserted_upload(&db);
        let summary = Summary::new(&upload, "short");
        db.complete_upload(&summary).unwrap();
        db.set_summary_pdf_location(&summary.id, "storage://artifacts/pdf/x.pdf")
            .unwrap();

        let listed = db.list_summaries("alice").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].upload_name, "a.txt");
        assert_eq!(listed[0].upload_kind, UploadKind::Document);
        assert_eq!(listed[0].qna_count, 0);
        assert!(listed[0].summary.pdf_location.is_some());

        assert!(db.list_summaries("bob").unwrap().is_empty());
    }
}
