//! Derived artifact storage: translations and Q&A pairs.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{QnaPair, Translation};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get the cached translation of a summary into a language
    pub fn get_translation(
        &self,
        summary_id: &str,
        language: &str,
    ) -> ServiceResult<Option<Translation>> {
        let conn = self.conn()?;

        let translation = conn
            .query_row(
                "SELECT id, summary_id, language, text, created_at FROM translations \
                 WHERE summary_id = ?1 AND language = ?2",
                params![summary_id, language],
                Translation::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(translation)
    }

    /// Store a translation unless one already exists for the language.
    ///
    /// Returns the stored row, which is the earlier one if two requests raced.
    pub fn insert_translation(&self, translation: &Translation) -> ServiceResult<Translation> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO translations (id, summary_id, language, text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(summary_id, language) DO NOTHING",
            params![
                translation.id,
                translation.summary_id,
                translation.language,
                translation.text,
                translation.created_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        let stored = conn
            .query_row(
                "SELECT id, summary_id, language, text, created_at FROM translations \
                 WHERE summary_id = ?1 AND language = ?2",
                params![translation.summary_id, translation.language],
                Translation::from_row,
            )
            .map_err(DatabaseError::Query)?;

        Ok(stored)
    }

    /// List all translations of a summary
    pub fn list_translations(&self, summary_id: &str) -> ServiceResult<Vec<Translation>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, summary_id, language, text, created_at FROM translations \
                 WHERE summary_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(DatabaseError::Query)?;

        let translations = stmt
            .query_map(params![summary_id], Translation::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(translations)
    }

    /// List the Q&A pairs of a summary in generation order
    pub fn list_qna(&self, summary_id: &str) -> ServiceResult<Vec<QnaPair>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT question, answer FROM qna_pairs WHERE summary_id = ?1 ORDER BY position",
            )
            .map_err(DatabaseError::Query)?;

        let pairs = stmt
            .query_map(params![summary_id], |row| {
                Ok(QnaPair {
                    question: row.get(0)?,
                    answer: row.get(1)?,
                })
            })
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(pairs)
    }

    /// Store generated Q&A pairs unless the summary already has some.
    ///
    /// Returns whatever set is stored afterwards.
    pub fn insert_qna(&self, summary_id: &str, pairs: &[QnaPair]) -> ServiceResult<Vec<QnaPair>> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction().map_err(DatabaseError::Query)?;

            let existing: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM qna_pairs WHERE summary_id = ?1",
                    params![summary_id],
                    |row| row.get(0),
                )
                .map_err(DatabaseError::Query)?;

            if existing == 0 {
                let now = Utc::now().to_rfc3339();
                for (position, pair) in pairs.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO qna_pairs (id, summary_id, position, question, answer, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            uuid::Uuid::new_v4().to_string(),
                            summary_id,
                            position as i64,
                            pair.question,
                            pair.answer,
                            now,
                        ],
                    )
                    .map_err(DatabaseError::Query)?;
                }
            }

            tx.commit().map_err(DatabaseError::Query)?;
        }

        self.list_qna(summary_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Summary, Upload, UploadKind};

    fn summary(db: &Database) -> Summary {
        let upload = Upload::new("alice", UploadKind::WebLink, "https://example.com", None);
        db.insert_upload(&upload).unwrap();
        let summary = Summary::new(&upload, "text");
        db.complete_upload(&summary).unwrap();
        summary
    }

    #[test]
    fn test_translation_is_stored_once_per_language() {
        let db = Database::open_in_memory().unwrap();
        let summary = summary(&db);

        let first = db
            .insert_translation(&Translation::new(&summary.id, "French", "Bonjour".into()))
            .unwrap();
        let second = db
            .insert_translation(&Translation::new(&summary.id, "French", "Salut".into()))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.text, "Bonjour");

        db.insert_translation(&Translation::new(&summary.id, "German", "Hallo".into()))
            .unwrap();
        assert_eq!(db.list_translations(&summary.id).unwrap().len(), 2);
        assert!(db.get_translation(&summary.id, "Thai").unwrap().is_none());
    }

    #[test]
    fn test_qna_keeps_first_generated_set() {
        let db = Database::open_in_memory().unwrap();
        let summary = summary(&db);

        let pairs = vec![
            QnaPair {
                question: "Q one".into(),
                answer: "A one".into(),
            },
            QnaPair {
                question: "Q two".into(),
                answer: "A two".into(),
            },
        ];
        let stored = db.insert_qna(&summary.id, &pairs).unwrap();
        assert_eq!(stored, pairs);

        let replacement = vec![QnaPair {
            question: "other".into(),
            answer: "other".into(),
        }];
        assert_eq!(db.insert_qna(&summary.id, &replacement).unwrap(), pairs);
    }
}
