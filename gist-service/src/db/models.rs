//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

/// Declared type of an uploaded source, fixed at creation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadKind {
    Document,
    Audio,
    Video,
    WebLink,
}

impl UploadKind {
    /// Kinds that may be submitted as raw file bytes
    pub fn accepts_file(&self) -> bool {
        matches!(self, UploadKind::Document | UploadKind::Audio)
    }
}

/// Processing status of an upload
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStatus {
    /// Created, never processed
    Pending,
    /// Extraction or summarization in progress
    Processing,
    /// Summary exists
    Done,
    /// Last attempt failed, see `last_error`
    Failed,
}

/// Upload record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub owner_id: String,
    pub kind: UploadKind,
    /// URL or `storage://` pointer the raw content is fetched from
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Populated from the summaries table when reading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Upload {
    /// Build a fresh pending upload
    pub fn new(
        owner_id: impl Into<String>,
        kind: UploadKind,
        origin: impl Into<String>,
        file_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            kind,
            origin: origin.into(),
            file_name,
            status: UploadStatus::Pending,
            last_error: None,
            summary_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Human-readable title: the file name when known, else the origin
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.origin)
    }

    /// Columns: id, owner_id, kind, origin, file_name, status, last_error,
    /// created_at, updated_at, summary_id
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            kind: parse_column(row, 2)?,
            origin: row.get(3)?,
            file_name: row.get(4)?,
            status: parse_column(row, 5)?,
            last_error: row.get(6)?,
            created_at: parse_timestamp(row, 7)?,
            updated_at: parse_timestamp(row, 8)?,
            summary_id: row.get(9)?,
        })
    }
}

/// Summary record, exactly one per completed upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub owner_id: String,
    pub upload_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(upload: &Upload, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: upload.owner_id.clone(),
            upload_id: upload.id.clone(),
            text: text.into(),
            audio_location: None,
            pdf_location: None,
            created_at: Utc::now(),
        }
    }

    /// Columns: id, owner_id, upload_id, text, audio_location, pdf_location, created_at
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            upload_id: row.get(2)?,
            text: row.get(3)?,
            audio_location: row.get(4)?,
            pdf_location: row.get(5)?,
            created_at: parse_timestamp(row, 6)?,
        })
    }
}

/// Summary with the details shown in listings
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOverview {
    #[serde(flatten)]
    pub summary: Summary,
    pub upload_kind: UploadKind,
    pub upload_name: String,
    pub translation_languages: Vec<String>,
    pub qna_count: usize,
}

/// Cached translation of a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub summary_id: String,
    pub language: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Translation {
    pub fn new(summary_id: impl Into<String>, language: impl Into<String>, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            summary_id: summary_id.into(),
            language: language.into(),
            text,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            summary_id: row.get(1)?,
            language: row.get(2)?,
            text: row.get(3)?,
            created_at: parse_timestamp(row, 4)?,
        })
    }
}

/// One generated question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaPair {
    pub question: String,
    pub answer: String,
}

/// Public account details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: parse_timestamp(row, 3)?,
        })
    }
}

/// Parse a TEXT column through `FromStr` (strum enums)
fn parse_column<T>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(UploadKind::WebLink.to_string(), "web_link");
        assert_eq!("document".parse::<UploadKind>().ok(), Some(UploadKind::Document));
        assert!("podcast".parse::<UploadKind>().is_err());
        assert_eq!(
            serde_json::to_value(UploadKind::WebLink).ok(),
            Some(serde_json::json!("web_link"))
        );
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(UploadStatus::Processing.as_ref(), "processing");
        assert_eq!("failed".parse::<UploadStatus>().ok(), Some(UploadStatus::Failed));
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(UploadKind::Document.accepts_file());
        assert!(!UploadKind::Video.accepts_file());
    }

    #[test]
    fn test_display_name_prefers_file_name() {
        let with_name = Upload::new("a", UploadKind::Document, "storage://x", Some("notes.pdf".into()));
        assert_eq!(with_name.display_name(), "notes.pdf");

        let link = Upload::new("a", UploadKind::WebLink, "https://example.com", None);
        assert_eq!(link.display_name(), "https://example.com");
    }
}
