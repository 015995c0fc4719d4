use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{Extractor, SourceFetcher};
use crate::config::RuntimeConfig;
use crate::error::ExtractionError;

/// Audio: speech-to-text through an OpenAI-compatible transcription endpoint
pub struct AudioExtractor {
    fetcher: Arc<SourceFetcher>,
    runtime_config: Arc<RuntimeConfig>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl AudioExtractor {
    pub fn new(fetcher: Arc<SourceFetcher>, runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            fetcher,
            runtime_config,
        }
    }
}

#[async_trait]
impl Extractor for AudioExtractor {
    async fn extract(&self, origin: &str) -> Result<String, ExtractionError> {
        let dynamic = self.runtime_config.dynamic();
        let config = dynamic.transcription.clone();
        let timeout = Duration::from_secs(dynamic.llm.request_timeout_secs);
        drop(dynamic);

        if config.api_key.is_empty() {
            return Err(ExtractionError::NotConfigured {
                service: "audio transcription",
            });
        }

        let source = self.fetcher.fetch(origin).await?;
        let size = source.data.len();

        let form = Form::new()
            .part(
                "file",
                Part::bytes(source.data.to_vec()).file_name(source.file_name.clone()),
            )
            .text("model", config.model.clone())
            .text("language", "en")
            .text("response_format", "json");

        let url = format!(
            "{}/v1/audio/transcriptions",
            config.base_url.trim_end_matches('/')
        );

        let response = self
            .fetcher
            .client()
            .post(&url)
            .bearer_auth(&config.api_key)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractionError::Fetch {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Transcription { status, message });
        }

        let transcription: TranscriptionResponse =
            response.json().await.map_err(|e| ExtractionError::Fetch {
                url: url.clone(),
                source: e,
            })?;

        tracing::info!(
            file = %source.file_name,
            size_bytes = size,
            chars = transcription.text.len(),
            "Transcribed audio"
        );

        Ok(transcription.text)
    }
}
