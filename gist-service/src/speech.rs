use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::error::SpeechError;

/// Longest input the speech endpoint accepts, in characters
pub const MAX_SPEECH_INPUT_CHARS: usize = 4096;

/// OpenAI-compatible text-to-speech client
pub struct SpeechClient {
    client: Client,
    runtime_config: Arc<RuntimeConfig>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

impl SpeechClient {
    pub fn new(runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            client: Client::new(),
            runtime_config,
        }
    }

    /// Synthesize MP3 audio for `text`, cut to [`MAX_SPEECH_INPUT_CHARS`]
    pub async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let dynamic = self.runtime_config.dynamic();
        let config = dynamic.speech.clone();
        let timeout = Duration::from_secs(dynamic.llm.request_timeout_secs);
        drop(dynamic);

        if config.api_key.is_empty() {
            return Err(SpeechError::NotConfigured);
        }

        let input = match text.char_indices().nth(MAX_SPEECH_INPUT_CHARS) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        };

        let url = format!("{}/v1/audio/speech", config.base_url.trim_end_matches('/'));
        let request = SpeechRequest {
            model: &config.model,
            voice: &config.voice,
            input,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis { status, message });
        }

        let audio = response.bytes().await.map_err(|e| SpeechError::Connection {
            url: url.clone(),
            source: e,
        })?;

        tracing::info!(
            chars = input.chars().count(),
            size_bytes = audio.len(),
            "Synthesized speech"
        );
        Ok(audio)
    }
}
