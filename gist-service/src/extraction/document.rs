use async_trait::async_trait;
use std::sync::Arc;

use super::{Extractor, SourceFetcher};
use crate::error::ExtractionError;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Documents: PDF via lopdf, anything else must be UTF-8 text
pub struct DocumentExtractor {
    fetcher: Arc<SourceFetcher>,
}

impl DocumentExtractor {
    pub fn new(fetcher: Arc<SourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Extractor for DocumentExtractor {
    async fn extract(&self, origin: &str) -> Result<String, ExtractionError> {
        let source = self.fetcher.fetch(origin).await?;

        if source.data.starts_with(PDF_MAGIC) {
            // PDF parsing is CPU-bound
            let data = source.data.clone();
            let text = tokio::task::spawn_blocking(move || pdf_text(&data)).await??;
            tracing::debug!(file = %source.file_name, chars = text.len(), "Extracted PDF text");
            return Ok(text);
        }

        String::from_utf8(source.data.to_vec()).map_err(|_| ExtractionError::UnsupportedFormat)
    }
}

/// Concatenate the text of every page
pub fn pdf_text(data: &[u8]) -> Result<String, ExtractionError> {
    let doc = lopdf::Document::load_mem(data).map_err(ExtractionError::Pdf)?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    Ok(text)
}
