use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{Extractor, SourceFetcher};
use crate::config::RuntimeConfig;
use crate::error::ExtractionError;

const VIDEO_ID_LEN: usize = 11;

/// Videos: the English transcript of a YouTube video
pub struct VideoExtractor {
    fetcher: Arc<SourceFetcher>,
    runtime_config: Arc<RuntimeConfig>,
}

impl VideoExtractor {
    pub fn new(fetcher: Arc<SourceFetcher>, runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            fetcher,
            runtime_config,
        }
    }
}

#[async_trait]
impl Extractor for VideoExtractor {
    async fn extract(&self, origin: &str) -> Result<String, ExtractionError> {
        let video_id = parse_video_id(origin).ok_or_else(|| ExtractionError::InvalidVideoUrl {
            url: origin.to_string(),
        })?;

        let base_url = self.runtime_config.dynamic().video.transcript_base_url.clone();
        let url = format!(
            "{}/api/timedtext?lang=en&v={}",
            base_url.trim_end_matches('/'),
            video_id
        );

        let body = self.fetcher.download(&url).await?;
        let transcript = transcript_text(&String::from_utf8_lossy(&body));

        tracing::info!(video_id = %video_id, chars = transcript.len(), "Fetched video transcript");
        Ok(transcript)
    }
}

/// Extract the 11-character video id from the usual YouTube URL forms
pub fn parse_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{url}")))
        .ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate: Option<String> = if host == "youtu.be" {
        segments.first().map(|s| s.to_string())
    } else if host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
    {
        match segments.as_slice() {
            ["watch", ..] => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            ["embed" | "v" | "e" | "shorts" | "live", id, ..] => Some(id.to_string()),
            _ => None,
        }
    } else {
        None
    };
    let candidate = candidate?;

    let valid = candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    valid.then_some(candidate)
}

/// Join the caption lines of a timedtext XML document
fn transcript_text(xml: &str) -> String {
    let document = Html::parse_fragment(xml);
    let Ok(lines) = Selector::parse("text") else {
        return String::new();
    };

    document
        .select(&lines)
        .map(|line| line.text().collect::<String>())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
