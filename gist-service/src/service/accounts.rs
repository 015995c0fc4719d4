//! Accounts and sessions: the identity ownership checks compare against.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::GistService;
use crate::auth::{generate_session_token, hash_password, hash_session_token, verify_password};
use crate::db::Account;
use crate::error::{ServiceError, ServiceResult};

/// Issued on login; only the token's hash is stored
#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub account: Account,
    pub expires_at: chrono::DateTime<Utc>,
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized {
        message: "invalid credentials".to_string(),
    }
}

impl GistService {
    pub fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> ServiceResult<Account> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::invalid("a valid email is required"));
        }

        let min_len = self.runtime_config.static_config.auth.min_password_len;
        if password.chars().count() < min_len {
            return Err(ServiceError::invalid(format!(
                "password must be at least {min_len} characters"
            )));
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: Utc::now(),
        };
        self.db.insert_account(&account, &hash_password(password)?)?;

        info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    pub fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let email = email.trim().to_lowercase();
        let (account, hash) = self
            .db
            .get_account_credentials(&email)?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(password, &hash)? {
            return Err(invalid_credentials());
        }

        let token = generate_session_token();
        let ttl_days = self.runtime_config.static_config.auth.session_ttl_days;
        let expires_at = Utc::now() + Duration::days(ttl_days);
        self.db
            .insert_session(&hash_session_token(&token), &account.id, expires_at)?;

        info!(account_id = %account.id, "Session started");
        Ok(Session {
            token,
            account,
            expires_at,
        })
    }

    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        self.db.delete_session(&hash_session_token(token))?;
        Ok(())
    }

    /// Resolve a session token to its account
    pub fn authenticate(&self, token: &str) -> ServiceResult<Account> {
        self.db
            .get_session_account(&hash_session_token(token), Utc::now())?
            .ok_or_else(|| ServiceError::Unauthorized {
                message: "session is missing or expired".to_string(),
            })
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn cleanup_expired_sessions(&self) -> ServiceResult<usize> {
        self.db.delete_expired_sessions(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::test_service;

    #[tokio::test]
    async fn test_register_validates_input() {
        let (_dir, service) = test_service().await;

        assert!(matches!(
            service.register("", "longenough", None),
            Err(ServiceError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.register("a@example.com", "short", None),
            Err(ServiceError::InvalidInput { .. })
        ));

        let account = service
            .register(" A@Example.com ", "longenough", Some(" Ann ".to_string()))
            .unwrap();
        assert_eq!(account.email, "a@example.com");
        assert_eq!(account.name.as_deref(), Some("Ann"));

        assert!(matches!(
            service.register("a@example.com", "different", None),
            Err(ServiceError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_authenticate_logout() {
        let (_dir, service) = test_service().await;
        let account = service.register("a@example.com", "longenough", None).unwrap();

        assert!(matches!(
            service.login("a@example.com", "wrong-password"),
            Err(ServiceError::Unauthorized { .. })
        ));
        assert!(matches!(
            service.login("nobody@example.com", "longenough"),
            Err(ServiceError::Unauthorized { .. })
        ));

        let session = service.login("a@example.com", "longenough").unwrap();
        assert_eq!(service.authenticate(&session.token).unwrap().id, account.id);

        service.logout(&session.token).unwrap();
        assert!(matches!(
            service.authenticate(&session.token),
            Err(ServiceError::Unauthorized { .. })
        ));
        assert_eq!(service.cleanup_expired_sessions().unwrap(), 0);
    }
}
