//! Upload processing: extraction, summarization and status transitions.
//!
//! One call drives one upload from `pending` (or `failed`) through
//! `processing` to `done` or `failed`. Every exit from `processing` either
//! records `last_error` or commits the summary together with `done`.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;
use crate::db::{Database, RecoveryReport, Summary, UploadKind, UploadStatus};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::extraction::ExtractorDispatch;
use crate::summarizer::Summarizer;

/// Error recorded on uploads found mid-processing at startup
pub const INTERRUPTED_MESSAGE: &str = "processing interrupted: service restarted";

/// Drives uploads through extraction and summarization
pub struct StatusPipeline {
    db: Arc<Database>,
    extractors: ExtractorDispatch,
    summarizer: Arc<dyn Summarizer>,
    runtime_config: Arc<RuntimeConfig>,
    /// Upload ids currently being processed by this instance
    in_flight: DashMap<String, ()>,
}

/// Releases an in-flight claim when dropped
struct InFlightClaim<'a> {
    in_flight: &'a DashMap<String, ()>,
    upload_id: String,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.upload_id);
    }
}

impl StatusPipeline {
    pub fn new(
        db: Arc<Database>,
        extractors: ExtractorDispatch,
        summarizer: Arc<dyn Summarizer>,
        runtime_config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            db,
            extractors,
            summarizer,
            runtime_config,
            in_flight: DashMap::new(),
        }
    }

    /// Process one upload on behalf of `caller` and return its new summary
    pub async fn process_upload(&self, caller: &str, upload_id: &str) -> ServiceResult<Summary> {
        let upload_id = upload_id.trim();
        if upload_id.is_empty() {
            return Err(ServiceError::invalid("upload_id is required"));
        }

        let upload = self
            .db
            .get_upload(upload_id)?
            .ok_or_else(|| ServiceError::not_found("upload", upload_id))?;

        if upload.owner_id != caller {
            return Err(ServiceError::forbidden("upload", upload_id));
        }

        if self.db.get_summary_for_upload(upload_id)?.is_some() {
            return Err(ServiceError::AlreadyProcessed {
                upload_id: upload_id.to_string(),
            });
        }

        if upload.kind == UploadKind::Video && !self.runtime_config.dynamic().extraction.video_enabled
        {
            info!(upload_id = %upload_id, "Video extraction is disabled, upload left pending");
            return Err(ServiceError::ServiceUnavailable {
                message: "video extraction is disabled".to_string(),
            });
        }

        let _claim = self.claim(upload_id)?;

        // Checked after claiming so a run that finished meanwhile is seen
        if self.db.get_summary_for_upload(upload_id)?.is_some() {
            return Err(ServiceError::AlreadyProcessed {
                upload_id: upload_id.to_string(),
            });
        }

        if !self
            .db
            .set_upload_status(upload_id, UploadStatus::Processing, None)?
        {
            return Err(ServiceError::not_found("upload", upload_id));
        }
        info!(upload_id = %upload_id, kind = %upload.kind, "Upload processing started");

        let text = match self.extractors.extract(upload.kind, &upload.origin).await {
            Ok(text) if text.trim().is_empty() => {
                return Err(self.fail(ServiceError::ExtractionFailed {
                    upload_id: upload_id.to_string(),
                    detail: "no extractable content".to_string(),
                }));
            }
            Ok(text) => text,
            Err(e) => {
                return Err(self.fail(ServiceError::ExtractionFailed {
                    upload_id: upload_id.to_string(),
                    detail: format_error_chain(&e),
                }));
            }
        };
        info!(upload_id = %upload_id, chars = text.chars().count(), "Extraction complete");

        let summary_text = match self.summarizer.summarize(&text).await {
            Ok(summary) if summary.trim().is_empty() => {
                return Err(self.fail(ServiceError::SummarizationFailed {
                    upload_id: upload_id.to_string(),
                    detail: "no summary generated".to_string(),
                }));
            }
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                return Err(self.fail(ServiceError::SummarizationFailed {
                    upload_id: upload_id.to_string(),
                    detail: format_error_chain(&e),
                }));
            }
        };

        let summary = Summary::new(&upload, summary_text);
        match self.db.complete_upload(&summary) {
            Ok(()) => {
                metrics::counter!("gist_uploads_processed_total", "outcome" => "done").increment(1);
                info!(upload_id = %upload_id, summary_id = %summary.id, "Upload processing done");
                Ok(summary)
            }
            Err(ServiceError::AlreadyProcessed { upload_id }) => {
                // Another writer committed a summary; its upload is done
                if let Err(e) = self.db.set_upload_status(&upload_id, UploadStatus::Done, None) {
                    error!(upload_id = %upload_id, error = %e, "Failed to restore done status");
                }
                Err(ServiceError::AlreadyProcessed { upload_id })
            }
            Err(e) => {
                let message = format!("failed to store summary: {}", format_error_chain(&e));
                self.record_failure(upload_id, &message, "store_failed");
                Err(e)
            }
        }
    }

    /// Repair uploads a previous run left in `processing`
    pub fn recover_interrupted_uploads(&self) -> ServiceResult<RecoveryReport> {
        let report = self.db.recover_interrupted_uploads(INTERRUPTED_MESSAGE)?;
        if report.completed > 0 || report.failed > 0 {
            warn!(
                completed = report.completed,
                failed = report.failed,
                "Recovered uploads interrupted mid-processing"
            );
        }
        Ok(report)
    }

    fn claim(&self, upload_id: &str) -> ServiceResult<InFlightClaim<'_>> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(upload_id.to_string()) {
            Entry::Occupied(_) => {
                info!(upload_id = %upload_id, "Upload is already being processed");
                Err(ServiceError::AlreadyProcessed {
                    upload_id: upload_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightClaim {
                    in_flight: &self.in_flight,
                    upload_id: upload_id.to_string(),
                })
            }
        }
    }

    /// Persist a stage failure and hand the error back
    fn fail(&self, err: ServiceError) -> ServiceError {
        let (upload_id, outcome) = match &err {
            ServiceError::ExtractionFailed { upload_id, .. } => (upload_id, "extraction_failed"),
            ServiceError::SummarizationFailed { upload_id, .. } => {
                (upload_id, "summarization_failed")
            }
            _ => return err,
        };

        self.record_failure(upload_id, &err.to_string(), outcome);
        err
    }

    fn record_failure(&self, upload_id: &str, message: &str, outcome: &'static str) {
        metrics::counter!("gist_uploads_processed_total", "outcome" => outcome).increment(1);
        warn!(upload_id = %upload_id, error = %message, "Upload processing failed");

        if let Err(e) = self
            .db
            .set_upload_status(upload_id, UploadStatus::Failed, Some(message))
        {
            error!(upload_id = %upload_id, error = %e, "Failed to record processing failure");
        }
    }
}
