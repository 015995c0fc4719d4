//! Settings API endpoints for hot-reloadable configuration.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{AppState, CurrentUser, ValidatedJson};
use crate::config::DynamicConfig;
use crate::error::{I18nError, ServiceError};

/// Response for GET /api/settings
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// All current settings (merged: defaults + DB overrides)
    pub settings: HashMap<String, serde_json::Value>,
    /// Which keys have DB overrides (vs using defaults)
    pub overridden: Vec<String>,
}

/// Request body for PUT /api/settings
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Settings to update (key -> value). Use null to delete/revert to default.
    pub settings: HashMap<String, serde_json::Value>,
}

fn current_settings(state: &AppState) -> Result<SettingsResponse, I18nError> {
    let db_settings = state
        .service
        .db
        .get_all_settings()
        .map_err(|e| state.i18n_error(e))?;

    let config = state.service.runtime_config.dynamic();
    let mut overridden: Vec<String> = db_settings.keys().cloned().collect();
    overridden.sort();

    Ok(SettingsResponse {
        settings: config.to_key_value_map(),
        overridden,
    })
}

/// GET /api/settings - retrieve all settings with their current values
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<SettingsResponse>, I18nError> {
    Ok(Json(current_settings(&state)?))
}

/// PUT /api/settings - update settings (triggers hot reload)
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ValidatedJson(request): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, I18nError> {
    let valid_keys = DynamicConfig::valid_keys();
    if let Some(key) = request
        .settings
        .keys()
        .find(|key| !valid_keys.contains(key.as_str()))
    {
        return Err(state.i18n_error(ServiceError::invalid(format!(
            "Unknown setting key: {key}"
        ))));
    }

    state
        .service
        .update_settings(request.settings)
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(current_settings(&state)?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, signed_in, test_router};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_settings_roundtrip_and_revert() {
        let (_dir, service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (status, body) = send(
            &router,
            "PUT",
            "/api/settings",
            Some(&token),
            Some(json!({ "settings": { "extraction.video_enabled": true, "speech.api_key": "sk-test" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["extraction.video_enabled"], true);
        assert_eq!(body["settings"]["speech.api_key"], "********");
        assert_eq!(
            body["overridden"],
            json!(["extraction.video_enabled", "speech.api_key"])
        );
        assert!(service.runtime_config.dynamic().extraction.video_enabled);

        let (_, body) = send(
            &router,
            "PUT",
            "/api/settings",
            Some(&token),
            Some(json!({ "settings": { "extraction.video_enabled": null } })),
        )
        .await;
        assert_eq!(body["settings"]["extraction.video_enabled"], false);
        assert_eq!(body["overridden"], json!(["speech.api_key"]));
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let (_dir, _service, router) = test_router().await;
        let token = signed_in(&router, "a@example.com").await;

        let (status, body) = send(
            &router,
            "PUT",
            "/api/settings",
            Some(&token),
            Some(json!({ "settings": { "llm.api_key": "x" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_settings_require_authentication() {
        let (_dir, _service, router) = test_router().await;
        let (status, _) = send(&router, "GET", "/api/settings", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
