//! Resolving an origin to raw bytes.

use bytes::{Bytes, BytesMut};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::ExtractionError;
use crate::storage::{self, Storage};

const BOT_USER_AGENT: &str = "Mozilla/5.0 (compatible; GistBot/1.0)";

/// Raw content of an origin
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub data: Bytes,
    /// Last path segment of the origin, used as a file name hint
    pub file_name: String,
}

/// Reads `storage://` origins from object storage and downloads http(s) origins
pub struct SourceFetcher {
    storage: Arc<dyn Storage>,
    client: Client,
    runtime_config: Arc<RuntimeConfig>,
}

impl SourceFetcher {
    pub fn new(storage: Arc<dyn Storage>, runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            storage,
            client: Client::new(),
            runtime_config,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn fetch(&self, origin: &str) -> Result<FetchedSource, ExtractionError> {
        let file_name = file_name_hint(origin);

        if let Some(key) = storage::key_from_location(origin) {
            let data = self.storage.get(key).await?;
            return Ok(FetchedSource { data, file_name });
        }

        if origin.starts_with("http://") || origin.starts_with("https://") {
            let data = self.download(origin).await?;
            return Ok(FetchedSource { data, file_name });
        }

        Err(ExtractionError::InvalidOrigin {
            origin: origin.to_string(),
        })
    }

    /// GET a URL under the configured timeout and size limit
    pub async fn download(&self, url: &str) -> Result<Bytes, ExtractionError> {
        let extraction = self.runtime_config.dynamic().extraction.clone();
        let max = extraction.max_source_bytes;

        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, BOT_USER_AGENT)
            .timeout(extraction.fetch_timeout())
            .send()
            .await
            .map_err(|e| ExtractionError::Fetch {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ExtractionError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        if let Some(size) = response.content_length()
            && size > max
        {
            return Err(ExtractionError::SourceTooLarge { size, max });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| ExtractionError::Fetch {
            url: url.to_string(),
            source: e,
        })? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max {
                return Err(ExtractionError::SourceTooLarge {
                    size: body.len() as u64,
                    max,
                });
            }
        }

        tracing::debug!(url = %url, size_bytes = body.len(), "Downloaded source");
        Ok(body.freeze())
    }
}

fn file_name_hint(origin: &str) -> String {
    let without_query = origin.split(['?', '#']).next().unwrap_or(origin);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("source")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DynamicConfig, StaticConfig};
    use crate::storage::LocalStorage;

    #[tokio::test]
    async fn test_fetch_reads_storage_origin() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        storage
            .put("uploads/a/notes.txt", Bytes::from_static(b"notes"))
            .await
            .unwrap();

        let config = Arc::new(RuntimeConfig::new(
            StaticConfig::default(),
            DynamicConfig::default(),
        ));
        let fetcher = SourceFetcher::new(Arc::new(storage), config);

        let fetched = fetcher.fetch("storage://uploads/a/notes.txt").await.unwrap();
        assert_eq!(fetched.data, Bytes::from_static(b"notes"));
        assert_eq!(fetched.file_name, "notes.txt");

        assert!(matches!(
            fetcher.fetch("ftp://example.com/a").await,
            Err(ExtractionError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn test_file_name_hint() {
        assert_eq!(file_name_hint("https://x.com/a/talk.mp3?sig=1"), "talk.mp3");
        assert_eq!(file_name_hint("storage://uploads/a/b.pdf"), "b.pdf");
        assert_eq!(file_name_hint("https://x.com/"), "x.com");
    }
}
