//! Derived artifacts of a completed summary: translations, Q&A pairs,
//! synthesized audio and PDF exports.
//!
//! Every generator checks ownership first and returns a stored artifact
//! when one exists. None of them touches the upload's status.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::GistService;
use super::prompts::{QNA_SYSTEM_PROMPT, TRANSLATION_SYSTEM_PROMPT, qna_prompt, translation_prompt};
use crate::db::{QnaPair, Summary, SummaryOverview, Translation};
use crate::error::{ServiceError, ServiceResult};
use crate::ollama;
use crate::pdf_export;
use crate::storage::key_from_location;
use crate::summarizer::{MAX_SUMMARY_INPUT_CHARS, truncate_chars};

/// Languages a summary can be translated into
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "Spanish",
    "French",
    "German",
    "Italian",
    "Portuguese",
    "Dutch",
    "Russian",
    "Chinese",
    "Japanese",
    "Korean",
    "Arabic",
    "Hindi",
    "Bengali",
    "Turkish",
    "Polish",
    "Ukrainian",
    "Vietnamese",
    "Thai",
    "Indonesian",
    "Malay",
];

pub const DEFAULT_QNA_COUNT: usize = 5;
pub const MAX_QNA_COUNT: usize = 20;

#[derive(Debug, Serialize)]
pub struct TranslationResult {
    #[serde(flatten)]
    pub translation: Translation,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct QnaResult {
    pub summary_id: String,
    pub pairs: Vec<QnaPair>,
    pub cached: bool,
}

/// Where a generated file was stored
#[derive(Debug, Serialize)]
pub struct ArtifactLocation {
    pub summary_id: String,
    pub location: String,
    pub cached: bool,
}

#[derive(Deserialize)]
struct GeneratedPair {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

/// Canonical name of a supported language, matched case-insensitively
fn supported_language(language: &str) -> Option<&'static str> {
    let language = language.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| supported.eq_ignore_ascii_case(language))
}

/// Parse a model reply into Q&A pairs, dropping incomplete ones
fn parse_qna(reply: &str) -> Vec<QnaPair> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let json = match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };

    match serde_json::from_str::<Vec<GeneratedPair>>(json) {
        Ok(pairs) => pairs
            .into_iter()
            .filter_map(|pair| {
                let question = pair.question.trim();
                let answer = pair.answer.trim();
                (!question.is_empty() && !answer.is_empty()).then(|| QnaPair {
                    question: question.to_string(),
                    answer: answer.to_string(),
                })
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Could not parse generated Q&A");
            Vec::new()
        }
    }
}

fn fallback_qna() -> Vec<QnaPair> {
    vec![
        QnaPair {
            question: "What is the main topic of this content?".to_string(),
            answer: "This content discusses various topics related to the subject matter."
                .to_string(),
        },
        QnaPair {
            question: "What are the key points covered?".to_string(),
            answer: "The key points include the main concepts and ideas presented in the text."
                .to_string(),
        },
    ]
}

impl GistService {
    /// List the caller's summaries, newest first
    pub fn list_summaries(&self, owner: &str) -> ServiceResult<Vec<SummaryOverview>> {
        self.db.list_summaries(owner)
    }

    pub fn get_summary(&self, owner: &str, summary_id: &str) -> ServiceResult<Summary> {
        self.owned_summary(owner, summary_id)
    }

    pub fn list_translations(&self, owner: &str, summary_id: &str) -> ServiceResult<Vec<Translation>> {
        self.owned_summary(owner, summary_id)?;
        self.db.list_translations(summary_id)
    }

    /// Translate a summary, reusing an earlier translation into the same language
    pub async fn translate(
        &self,
        owner: &str,
        summary_id: &str,
        language: &str,
    ) -> ServiceResult<TranslationResult> {
        let language = supported_language(language).ok_or_else(|| {
            ServiceError::invalid(format!("unsupported language: {}", language.trim()))
        })?;
        let summary = self.owned_summary(owner, summary_id)?;

        if let Some(translation) = self.db.get_translation(summary_id, language)? {
            return Ok(TranslationResult {
                translation,
                cached: true,
            });
        }

        let input = truncate_chars(&summary.text, MAX_SUMMARY_INPUT_CHARS);
        let text = ollama::complete(
            &self.ollama,
            TRANSLATION_SYSTEM_PROMPT,
            translation_prompt(language, &input),
            "translation",
        )
        .await?;

        let translation = self
            .db
            .insert_translation(&Translation::new(summary_id, language, text))?;

        metrics::counter!("gist_artifacts_generated_total", "kind" => "translation").increment(1);
        info!(summary_id = %summary_id, language = %language, "Summary translated");

        Ok(TranslationResult {
            translation,
            cached: false,
        })
    }

    pub fn list_qna(&self, owner: &str, summary_id: &str) -> ServiceResult<Vec<QnaPair>> {
        self.owned_summary(owner, summary_id)?;
        self.db.list_qna(summary_id)
    }

    /// Generate Q&A pairs for a summary unless it already has some
    pub async fn generate_qna(
        &self,
        owner: &str,
        summary_id: &str,
        num_questions: Option<usize>,
    ) -> ServiceResult<QnaResult> {
        let num_questions = num_questions.unwrap_or(DEFAULT_QNA_COUNT);
        if !(1..=MAX_QNA_COUNT).contains(&num_questions) {
            return Err(ServiceError::invalid(format!(
                "num_questions must be between 1 and {MAX_QNA_COUNT}"
            )));
        }

        let summary = self.owned_summary(owner, summary_id)?;

        let existing = self.db.list_qna(summary_id)?;
        if !existing.is_empty() {
            return Ok(QnaResult {
                summary_id: summary_id.to_string(),
                pairs: existing,
                cached: true,
            });
        }

        let input = truncate_chars(&summary.text, MAX_SUMMARY_INPUT_CHARS);
        let reply = ollama::complete(
            &self.ollama,
            QNA_SYSTEM_PROMPT,
            qna_prompt(num_questions, &input),
            "Q&A",
        )
        .await?;

        let mut pairs = parse_qna(&reply);
        if pairs.is_empty() {
            warn!(summary_id = %summary_id, "No usable Q&A pairs generated, using fallback");
            pairs = fallback_qna();
        }
        pairs.truncate(num_questions);

        let pairs = self.db.insert_qna(summary_id, &pairs)?;

        metrics::counter!("gist_artifacts_generated_total", "kind" => "qna").increment(1);
        info!(summary_id = %summary_id, count = pairs.len(), "Q&A generated");

        Ok(QnaResult {
            summary_id: summary_id.to_string(),
            pairs,
            cached: false,
        })
    }

    /// Synthesize spoken audio of a summary
    pub async fn synthesize_audio(&self, owner: &str, summary_id: &str) -> ServiceResult<ArtifactLocation> {
        let summary = self.owned_summary(owner, summary_id)?;
        if summary.text.trim().is_empty() {
            return Err(ServiceError::invalid("summary has no text to synthesize"));
        }

        if let Some(location) = summary.audio_location {
            return Ok(ArtifactLocation {
                summary_id: summary.id,
                location,
                cached: true,
            });
        }

        let audio = self.speech.synthesize(&summary.text).await?;
        let location = self
            .storage
            .put(&format!("artifacts/audio/{summary_id}.mp3"), audio)
            .await?;
        self.db.set_summary_audio_location(summary_id, &location)?;

        metrics::counter!("gist_artifacts_generated_total", "kind" => "audio").increment(1);
        info!(summary_id = %summary_id, location = %location, "Summary audio stored");

        Ok(ArtifactLocation {
            summary_id: summary.id,
            location,
            cached: false,
        })
    }

    /// Read back the synthesized audio of a summary
    pub async fn audio_data(&self, owner: &str, summary_id: &str) -> ServiceResult<Bytes> {
        let summary = self.owned_summary(owner, summary_id)?;
        let location = summary
            .audio_location
            .ok_or_else(|| ServiceError::not_found("audio", summary_id))?;
        self.stored_artifact(&location).await
    }

    /// Render the summary with its translations and Q&A as a PDF
    pub async fn export_pdf(&self, owner: &str, summary_id: &str) -> ServiceResult<ArtifactLocation> {
        let summary = self.owned_summary(owner, summary_id)?;

        if let Some(location) = summary.pdf_location {
            return Ok(ArtifactLocation {
                summary_id: summary.id,
                location,
                cached: true,
            });
        }

        let title = self
            .db
            .get_upload(&summary.upload_id)?
            .map(|upload| upload.display_name().to_string())
            .unwrap_or_else(|| "Summary".to_string());
        let translations = self.db.list_translations(summary_id)?;
        let qna = self.db.list_qna(summary_id)?;
        let text = summary.text.clone();

        // Layout and serialization are CPU-bound
        let pdf = tokio::task::spawn_blocking(move || {
            pdf_export::summary_report(&title, Utc::now(), &text, &translations, &qna)
        })
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("PDF rendering task failed: {e}"),
        })?
        .map_err(|e| ServiceError::Internal {
            message: format!("failed to render PDF: {e}"),
        })?;

        let size = pdf.len();
        let location = self
            .storage
            .put(&format!("artifacts/pdf/{summary_id}.pdf"), Bytes::from(pdf))
            .await?;
        self.db.set_summary_pdf_location(summary_id, &location)?;

        metrics::counter!("gist_artifacts_generated_total", "kind" => "pdf").increment(1);
        info!(summary_id = %summary_id, size_bytes = size, "Summary PDF stored");

        Ok(ArtifactLocation {
            summary_id: summary.id,
            location,
            cached: false,
        })
    }

    /// Read back the exported PDF of a summary
    pub async fn pdf_data(&self, owner: &str, summary_id: &str) -> ServiceResult<Bytes> {
        let summary = self.owned_summary(owner, summary_id)?;
        let location = summary
            .pdf_location
            .ok_or_else(|| ServiceError::not_found("pdf", summary_id))?;
        self.stored_artifact(&location).await
    }

    async fn stored_artifact(&self, location: &str) -> ServiceResult<Bytes> {
        let key = key_from_location(location).ok_or_else(|| ServiceError::Internal {
            message: format!("artifact location is not in storage: {location}"),
        })?;
        Ok(self.storage.get(key).await?)
    }
}
