//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// This function is called during database initialization to ensure
/// the schema is up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    // Initial schema setup
    conn.execute_batch(
        r#"
        -- Accounts and login sessions
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Only the SHA-256 of a session token is stored
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);

        -- Uploaded sources
        CREATE TABLE IF NOT EXISTS uploads (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            origin TEXT NOT NULL,
            file_name TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_uploads_owner ON uploads(owner_id);
        CREATE INDEX IF NOT EXISTS idx_uploads_status ON uploads(status);

        -- At most one summary per upload
        CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            upload_id TEXT NOT NULL UNIQUE,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (upload_id) REFERENCES uploads(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_summaries_owner ON summaries(owner_id);

        CREATE TABLE IF NOT EXISTS translations (
            id TEXT PRIMARY KEY,
            summary_id TEXT NOT NULL,
            language TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(summary_id, language),
            FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS qna_pairs (
            id TEXT PRIMARY KEY,
            summary_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_qna_pairs_summary ON qna_pairs(summary_id);
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    // SQLite doesn't have IF NOT EXISTS for ALTER TABLE, so we check if columns exist
    run_artifact_locations_migration(conn)?;
    run_settings_table_migration(conn)?;

    Ok(())
}

/// Migration: Add derived artifact locations to summaries
fn run_artifact_locations_migration(conn: &Connection) -> ServiceResult<()> {
    let has_audio_location: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('summaries') WHERE name='audio_location'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_audio_location {
        conn.execute_batch(
            r#"
            ALTER TABLE summaries ADD COLUMN audio_location TEXT;
            ALTER TABLE summaries ADD COLUMN pdf_location TEXT;
            "#,
        )
        .map_err(|e| DatabaseError::Migration {
            message: format!("Failed to add artifact location columns: {}", e),
        })?;
    }

    Ok(())
}

/// Migration: Create settings table for runtime configuration overrides
fn run_settings_table_migration(conn: &Connection) -> ServiceResult<()> {
    let has_settings_table: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='settings'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_settings_table {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .map_err(|e| DatabaseError::Migration {
            message: format!("Failed to create settings table: {}", e),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let columns: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('summaries') WHERE name IN ('audio_location', 'pdf_location')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(columns, 2);
    }
}
