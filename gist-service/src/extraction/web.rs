use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use super::{Extractor, SourceFetcher};
use crate::error::ExtractionError;

/// Page chrome that never counts as content
const IGNORED_SELECTOR: &str =
    "script, style, noscript, nav, footer, header, .advertisement, .ad, .social-share";

/// Candidate content containers, the longest text wins
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    r#"div[class*="content"]"#,
    r#"div[class*="article"]"#,
    r#"div[class*="post"]"#,
    "main",
    ".entry-content",
    ".post-content",
    ".article-content",
];

/// Below this, paragraphs are collected instead
const MIN_CONTAINER_CHARS: usize = 100;

/// Below this, the page is considered empty
const MIN_MEANINGFUL_CHARS: usize = 50;

/// Web links: readable text of an HTML page
pub struct WebExtractor {
    fetcher: Arc<SourceFetcher>,
}

impl WebExtractor {
    pub fn new(fetcher: Arc<SourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Extractor for WebExtractor {
    async fn extract(&self, origin: &str) -> Result<String, ExtractionError> {
        let page = self.fetcher.fetch(origin).await?;
        let html = String::from_utf8_lossy(&page.data);

        let text = extract_readable_text(&html)?;
        tracing::debug!(url = %origin, chars = text.len(), "Extracted web page text");
        Ok(text)
    }
}

/// Pull the main readable text out of an HTML document
pub fn extract_readable_text(html: &str) -> Result<String, ExtractionError> {
    let document = Html::parse_document(html);

    let ignored = selector(IGNORED_SELECTOR)?;

    let mut best = String::new();
    for css in CONTENT_SELECTORS {
        if let Some(element) = document.select(&selector(css)?).next() {
            let text = visible_text(element, &ignored);
            if text.len() > best.len() {
                best = text;
            }
        }
    }

    if collapse_whitespace(&best).len() < MIN_CONTAINER_CHARS {
        let paragraphs = selector("p")?;
        best = document
            .select(&paragraphs)
            .map(|p| visible_text(p, &ignored))
            .collect::<Vec<_>>()
            .join("\n\n");
    }

    let text = collapse_whitespace(&best);
    if text.chars().count() < MIN_MEANINGFUL_CHARS {
        return Err(ExtractionError::NoMeaningfulContent);
    }

    Ok(text)
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::UnsupportedFormat)
}

/// Text under an element, skipping text inside ignored elements
fn visible_text(element: ElementRef<'_>, ignored: &Selector) -> String {
    let mut parts = Vec::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| ignored.matches(&ancestor));
            if !hidden {
                parts.push(&**text);
            }
        }
    }
    parts.join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Rust is a systems programming language focused on safety, speed, \
        and concurrency. It achieves memory safety without a garbage collector.";

    #[test]
    fn test_prefers_article_and_skips_chrome() {
        let html = format!(
            r#"<html><head><style>body {{ color: red }}</style></head><body>
            <header>Site header</header>
            <nav>Home | About</nav>
            <article><h1>Intro</h1><p>{ARTICLE}</p>
              <div class="social-share">Share this!</div>
              <script>track()</script>
            </article>
            <footer>Copyright</footer>
            </body></html>"#
        );

        let text = extract_readable_text(&html).unwrap();
        assert!(text.starts_with("Intro Rust is a systems"));
        assert!(!text.contains("Share this"));
        assert!(!text.contains("track()"));
        assert!(!text.contains("Site header"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_falls_back_to_paragraphs() {
        let html = format!(
            "<html><body><div><p>{ARTICLE}</p><p>Second   paragraph\n here.</p></div></body></html>"
        );

        let text = extract_readable_text(&html).unwrap();
        assert!(text.contains("garbage collector."));
        assert!(text.ends_with("Second paragraph here."));
    }

    #[test]
    fn test_short_page_is_not_meaningful() {
        let html = "<html><body><p>Too short.</p></body></html>";
        assert!(matches!(
            extract_readable_text(html),
            Err(ExtractionError::NoMeaningfulContent)
        ));
    }
}
