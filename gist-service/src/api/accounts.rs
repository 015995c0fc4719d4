//! Account API endpoints and the bearer-token caller extractor.

use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::Account;
use crate::error::{I18nError, ServiceError};
use crate::service::Session;

use super::{AppState, MessageResponse, ValidatedJson};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`
pub struct CurrentUser {
    pub account: Account,
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.account.id
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = I18nError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    state.i18n_error(ServiceError::Unauthorized {
                        message: "missing bearer token".to_string(),
                    })
                })?;

        let token = bearer.token().to_string();
        let account = state
            .service
            .authenticate(&token)
            .map_err(|e| state.i18n_error(e))?;

        Ok(Self { account, token })
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Account>), I18nError> {
    let account = state
        .service
        .register(&request.email, &request.password, request.name)
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<Session>, I18nError> {
    let session = state
        .service
        .login(&request.email, &request.password)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(session))
}

pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<MessageResponse>, I18nError> {
    state
        .service
        .logout(&user.token)
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(MessageResponse {
        success: true,
        message: state.service.i18n.get("en", "account-logged-out", None),
    }))
}

pub async fn me_handler(user: CurrentUser) -> Json<Account> {
    Json(user.account)
}
