mod accounts;
mod artifacts;
mod pipeline;
mod prompts;
mod uploads;

pub use accounts::Session;
pub use artifacts::{ArtifactLocation, QnaResult, TranslationResult};
pub use pipeline::StatusPipeline;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::db::{Database, RecoveryReport, Summary, Upload};
use crate::error::{ServiceError, ServiceResult};
use crate::extraction::{ExtractorDispatch, SourceFetcher};
use crate::i18n::I18n;
use crate::ollama::OllamaClient;
use crate::speech::SpeechClient;
use crate::storage::Storage;
use crate::summarizer::{LlmSummarizer, Summarizer};

/// Main service coordinator
pub struct GistService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub db: Arc<Database>,
    pub ollama: Arc<OllamaClient>,
    pub storage: Arc<dyn Storage>,
    pub speech: SpeechClient,
    pub pipeline: StatusPipeline,
    pub i18n: Arc<I18n>,
}

impl GistService {
    /// Create a new service instance with the standard extractors and summarizer
    pub async fn new(
        db: Arc<Database>,
        runtime_config: Arc<RuntimeConfig>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        info!("Initializing gist service");

        let ollama = Arc::new(OllamaClient::new(runtime_config.clone()));

        let base_url = runtime_config.dynamic().llm.base_url.clone();
        if ollama.health_check().await {
            info!(url = %base_url, "LLM endpoint is available");
        } else {
            warn!(url = %base_url, "LLM endpoint is not available");
        }

        let fetcher = Arc::new(SourceFetcher::new(storage.clone(), runtime_config.clone()));
        let extractors = ExtractorDispatch::standard(fetcher, runtime_config.clone());
        let summarizer = Arc::new(LlmSummarizer::new(ollama.clone()));

        Self::from_parts(db, runtime_config, storage, ollama, extractors, summarizer)
    }

    /// Assemble a service from explicit collaborators
    pub fn from_parts(
        db: Arc<Database>,
        runtime_config: Arc<RuntimeConfig>,
        storage: Arc<dyn Storage>,
        ollama: Arc<OllamaClient>,
        extractors: ExtractorDispatch,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let pipeline =
            StatusPipeline::new(db.clone(), extractors, summarizer, runtime_config.clone());

        Self {
            speech: SpeechClient::new(runtime_config.clone()),
            runtime_config,
            db,
            ollama,
            storage,
            pipeline,
            i18n: Arc::new(I18n::new()),
        }
    }

    /// Extract and summarize one upload
    pub async fn summarize_upload(&self, caller: &str, upload_id: &str) -> ServiceResult<Summary> {
        self.pipeline.process_upload(caller, upload_id).await
    }

    /// Repair uploads interrupted by a restart
    pub fn recover_interrupted_uploads(&self) -> ServiceResult<RecoveryReport> {
        self.pipeline.recover_interrupted_uploads()
    }

    /// Update settings and hot-reload the dynamic configuration.
    ///
    /// Clients read the dynamic configuration per request, so nothing needs
    /// to be rebuilt.
    pub fn update_settings(&self, updates: HashMap<String, serde_json::Value>) -> ServiceResult<()> {
        self.db.set_settings(updates)?;
        self.runtime_config.reload_from_db(&self.db)?;
        Ok(())
    }

    /// Load an upload the caller owns
    pub(crate) fn owned_upload(&self, caller: &str, upload_id: &str) -> ServiceResult<Upload> {
        let upload = self
            .db
            .get_upload(upload_id)?
            .ok_or_else(|| ServiceError::not_found("upload", upload_id))?;

        if upload.owner_id != caller {
            return Err(ServiceError::forbidden("upload", upload_id));
        }
        Ok(upload)
    }

    /// Load a summary the caller owns
    pub(crate) fn owned_summary(&self, caller: &str, summary_id: &str) -> ServiceResult<Summary> {
        let summary = self
            .db
            .get_summary(summary_id)?
            .ok_or_else(|| ServiceError::not_found("summary", summary_id))?;

        if summary.owner_id != caller {
            return Err(ServiceError::forbidden("summary", summary_id));
        }
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{DynamicConfig, StaticConfig};
    use crate::db::UploadKind;
    use crate::error::ExtractionError;
    use crate::extraction::Extractor;
    use crate::storage::LocalStorage;
    use async_trait::async_trait;

    pub struct FixedExtractor(pub &'static str);

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _origin: &str) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    pub struct FixedSummarizer(pub &'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _text: &str) -> ServiceResult<String> {
            Ok(self.0.to_string())
        }
    }

    /// Service over an in-memory database and a temporary object store.
    /// The LLM endpoint points at a closed port.
    pub async fn test_service() -> (tempfile::TempDir, GistService) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let db = Arc::new(Database::open_in_memory().unwrap());

        let mut dynamic = DynamicConfig::default();
        dynamic.llm.base_url = "http://127.0.0.1:9".to_string();
        dynamic.llm.request_timeout_secs = 1;
        let config = Arc::new(RuntimeConfig::new(StaticConfig::default(), dynamic));

        let extractor: Arc<dyn Extractor> = Arc::new(FixedExtractor(
            "Extracted text that is long enough to be summarized by the fake summarizer.",
        ));
        let extractors = ExtractorDispatch::empty()
            .register(UploadKind::Document, extractor.clone())
            .register(UploadKind::Audio, extractor.clone())
            .register(UploadKind::Video, extractor.clone())
            .register(UploadKind::WebLink, extractor);

        let service = GistService::from_parts(
            db,
            config.clone(),
            storage,
            Arc::new(OllamaClient::new(config)),
            extractors,
            Arc::new(FixedSummarizer("A short summary.")),
        );
        (dir, service)
    }
}
