//! Account and session operations.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};

use super::models::{Account, parse_timestamp};
use super::{Database, is_unique_violation};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

impl Database {
    /// Insert a new account. A duplicate email is invalid input.
    pub fn insert_account(&self, account: &Account, password_hash: &str) -> ServiceResult<()> {
        let conn = self.conn()?;

        let result = conn.execute(
            "INSERT INTO accounts (id, email, name, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.email,
                account.name,
                password_hash,
                account.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(ServiceError::invalid("email is already registered"))
            }
            Err(e) => Err(DatabaseError::Query(e).into()),
        }
    }

    /// Look up an account and its password hash by email
    pub fn get_account_credentials(
        &self,
        email: &str,
    ) -> ServiceResult<Option<(Account, String)>> {
        let conn = self.conn()?;

        let credentials = conn
            .query_row(
                "SELECT id, email, name, created_at, password_hash FROM accounts WHERE email = ?1",
                params![email],
                |row| Ok((Account::from_row(row)?, row.get(4)?)),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(credentials)
    }

    /// Store a session by the hash of its token
    pub fn insert_session(
        &self,
        token_hash: &str,
        account_id: &str,
        expires_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO sessions (token_hash, account_id, expires_at, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token_hash,
                account_id,
                session_timestamp(expires_at),
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Resolve a session token hash to its account if the session has not expired
    pub fn get_session_account(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Account>> {
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT a.id, a.email, a.name, a.created_at, s.expires_at \
                 FROM sessions s JOIN accounts a ON a.id = s.account_id \
                 WHERE s.token_hash = ?1",
                params![token_hash],
                |row| Ok((Account::from_row(row)?, parse_timestamp(row, 4)?)),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(found
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(account, _)| account))
    }

    /// Delete a session. Returns false when it did not exist.
    pub fn delete_session(&self, token_hash: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .map_err(DatabaseError::Query)?;

        Ok(deleted > 0)
    }

    /// Remove sessions that expired before `now`
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let conn = self.conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![session_timestamp(now)],
            )
            .map_err(DatabaseError::Query)?;

        Ok(deleted)
    }
}

/// Fixed-width UTC form so expiries compare correctly as text
fn session_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
