use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::RuntimeConfig;
use crate::error::{LlmError, ServiceResult};

/// Ollama chat API client
///
/// Endpoint, model and timeout are read from the dynamic config on every
/// call so settings changes apply without a restart.
pub struct OllamaClient {
    client: Client,
    runtime_config: Arc<RuntimeConfig>,
}

impl OllamaClient {
    pub fn new(runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            client: Client::new(),
            runtime_config,
        }
    }

    /// Check if the LLM endpoint is available
    pub async fn health_check(&self) -> bool {
        let base_url = self.runtime_config.dynamic().llm.base_url.clone();
        let url = format!("{}/api/tags", base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "LLM health check failed");
                false
            }
        }
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let base_url = self.runtime_config.dynamic().llm.base_url.clone();
        let url = format!("{}/api/tags", base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Generation {
                status: response.status().as_u16(),
                message: "Failed to list models".to_string(),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse { source: e })?;

        Ok(tags
            .models
            .into_iter()
            .map(|model| ModelInfo {
                name: model.name,
                parameter_size: model.details.parameter_size,
                quantization: model.details.quantization_level,
            })
            .collect())
    }

    /// Generate a non-streaming chat completion with the configured model
    pub async fn generate_simple(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let llm = self.runtime_config.dynamic().llm.clone();
        let url = format!("{}/api/chat", llm.base_url);

        let request = OllamaChatRequest {
            model: llm.model.clone(),
            messages,
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(llm.temperature),
            }),
        };

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(llm.request_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();

            if message.contains("model") && message.contains("not found") {
                return Err(LlmError::ModelNotFound { model: llm.model });
            }

            return Err(LlmError::Generation { status, message });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse { source: e })?;

        Ok(chat_response.message.content)
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub parameter_size: Option<String>,
    pub quantization: Option<String>,
}

/// Ask for a completion and reject blank output
pub async fn complete(
    client: &OllamaClient,
    system: &str,
    user: String,
    what: &'static str,
) -> ServiceResult<String> {
    let content = client
        .generate_simple(vec![ChatMessage::system(system), ChatMessage::user(user)])
        .await?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyCompletion { what }.into());
    }
    Ok(trimmed.to_string())
}

// Internal Ollama API types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    details: ModelDetails,
}

#[derive(Debug, Default, Deserialize)]
struct ModelDetails {
    #[serde(default)]
    parameter_size: Option<String>,
    #[serde(default)]
    quantization_level: Option<String>,
}
