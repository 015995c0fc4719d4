//! Content extraction: turning an upload's origin into plain text.
//!
//! Each upload kind has one [`Extractor`]. [`ExtractorDispatch`] picks the
//! right one for an upload. Extractors only return trimmed text; deciding
//! whether the text is usable is left to the caller.

mod audio;
mod document;
mod source;
mod video;
mod web;

pub use audio::AudioExtractor;
pub use document::{DocumentExtractor, pdf_text};
pub use source::SourceFetcher;
pub use video::VideoExtractor;
pub use web::WebExtractor;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::db::UploadKind;
use crate::error::ExtractionError;

/// Produces plain text from an origin location
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, origin: &str) -> Result<String, ExtractionError>;
}

/// Routes each upload kind to its extractor
#[derive(Clone, Default)]
pub struct ExtractorDispatch {
    extractors: HashMap<UploadKind, Arc<dyn Extractor>>,
}

impl ExtractorDispatch {
    /// Dispatch with no extractors registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dispatch wired to the real extractors for every kind
    pub fn standard(fetcher: Arc<SourceFetcher>, runtime_config: Arc<RuntimeConfig>) -> Self {
        Self::empty()
            .register(
                UploadKind::Document,
                Arc::new(DocumentExtractor::new(fetcher.clone())),
            )
            .register(
                UploadKind::Audio,
                Arc::new(AudioExtractor::new(fetcher.clone(), runtime_config.clone())),
            )
            .register(
                UploadKind::Video,
                Arc::new(VideoExtractor::new(fetcher.clone(), runtime_config)),
            )
            .register(UploadKind::WebLink, Arc::new(WebExtractor::new(fetcher)))
    }

    pub fn register(mut self, kind: UploadKind, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(kind, extractor);
        self
    }

    pub async fn extract(&self, kind: UploadKind, origin: &str) -> Result<String, ExtractionError> {
        let extractor = self
            .extractors
            .get(&kind)
            .ok_or_else(|| ExtractionError::NoExtractor {
                kind: kind.to_string(),
            })?;

        let text = extractor.extract(origin).await?;
        Ok(text.trim().to_string())
    }
}
