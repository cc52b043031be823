//! Scan orchestrator.
//!
//! Single entry point for one uploaded file: route on media type, run the
//! configured detector, encode the original bytes and hand the record to
//! the store. All collaborators are injected so the whole flow runs against
//! mocks in tests.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{ConfigError, ScanConfig};
use crate::db::repository::{ScanStore, SqliteScanStore};
use crate::db::DatabaseError;
use crate::models::{ScanRecord, ScanStrategy, SensitiveData};
use crate::pipeline::classification::{
    classify_with_retry, ClassificationError, GeminiClient, RemoteClassifier, MAX_RETRIES,
};
use crate::pipeline::detection::{merge_results, scan_bytes, scan_bytes_lossy};
use crate::pipeline::extraction::{default_engine, ExtractionError, TextExtractor};
use crate::pipeline::media::{MediaKind, MediaType};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Terminal failure of a scan. The underlying cause is chained as source.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Could not read file content: {0}")]
    ContentRead(String),

    #[error("Classification failed")]
    ClassificationExhausted(#[from] ClassificationError),

    #[error("Could not encode file content: {0}")]
    Encoding(String),

    #[error("Failed to store scan result")]
    Persistence(#[from] DatabaseError),

    #[error("Scan task did not complete: {0}")]
    Task(String),
}

/// Errors raised while wiring a processor from configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot open scan database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cannot create classifier client: {0}")]
    Classifier(#[from] ClassificationError),

    #[error("Cannot initialize OCR: {0}")]
    Ocr(#[from] ExtractionError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Progress of a single scan. `Persisted` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Received,
    Routed,
    Extracting,
    Classifying,
    Validated,
    Persisted,
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Routed => "routed",
            Self::Extracting => "extracting",
            Self::Classifying => "classifying",
            Self::Validated => "validated",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct ScanInput {
    pub file_name: String,
    /// As declared by the uploader, parameters allowed.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// A persisted scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub id: Uuid,
    pub record: ScanRecord,
}

enum Detector {
    Remote {
        classifier: Box<dyn RemoteClassifier + Send + Sync>,
        max_attempts: usize,
    },
    Local(TextExtractor),
}

impl Detector {
    /// Remote classification reads images and PDFs; local detection reads
    /// text and images.
    fn accepts(&self, kind: MediaKind) -> bool {
        match self {
            Detector::Remote { .. } => matches!(kind, MediaKind::Image | MediaKind::Pdf),
            Detector::Local(_) => matches!(kind, MediaKind::Text | MediaKind::Image),
        }
    }
}

/// Drives one file through detection and persistence.
pub struct ScanProcessor {
    detector: Detector,
    store: Arc<dyn ScanStore + Send + Sync>,
}

impl ScanProcessor {
    /// Classify with a remote service, `MAX_RETRIES` attempts per file.
    pub fn remote(
        classifier: Box<dyn RemoteClassifier + Send + Sync>,
        store: Arc<dyn ScanStore + Send + Sync>,
    ) -> Self {
        Self {
            detector: Detector::Remote {
                classifier,
                max_attempts: MAX_RETRIES,
            },
            store,
        }
    }

    /// Detect locally with the pattern rules, OCR-ing images first.
    pub fn local(extractor: TextExtractor, store: Arc<dyn ScanStore + Send + Sync>) -> Self {
        Self {
            detector: Detector::Local(extractor),
            store,
        }
    }

    /// Override the attempt budget. No effect on the local strategy.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        if let Detector::Remote { max_attempts, .. } = &mut self.detector {
            *max_attempts = attempts.max(1);
        }
        self
    }

    pub fn strategy(&self) -> ScanStrategy {
        match self.detector {
            Detector::Remote { .. } => ScanStrategy::Remote,
            Detector::Local(_) => ScanStrategy::Local,
        }
    }

    /// Run one file through the pipeline.
    pub fn scan(&self, input: ScanInput) -> Result<ScanOutcome, ScanError> {
        let _span = tracing::info_span!(
            "scan",
            file_name = %input.file_name,
            strategy = %self.strategy(),
            size = input.bytes.len()
        )
        .entered();

        let mut state = ScanState::Received;
        match self.run(&input, &mut state) {
            Ok(outcome) => {
                tracing::info!(
                    id = %outcome.id,
                    file_name = %input.file_name,
                    "Scan stored"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    file_name = %input.file_name,
                    state = %state,
                    error = %e,
                    "Scan failed"
                );
                advance(&mut state, ScanState::Failed, &input.file_name);
                Err(e)
            }
        }
    }

    fn run(&self, input: &ScanInput, state: &mut ScanState) -> Result<ScanOutcome, ScanError> {
        let media = MediaType::resolve(&input.media_type, &input.bytes);
        if !self.detector.accepts(media.kind()) {
            return Err(ScanError::UnsupportedFileType(media.to_string()));
        }
        if input.bytes.is_empty() {
            return Err(ScanError::ContentRead(format!("{} is empty", input.file_name)));
        }

        let sensitive_data = match &self.detector {
            Detector::Remote {
                classifier,
                max_attempts,
            } => {
                advance(state, ScanState::Routed, &input.file_name);
                advance(state, ScanState::Classifying, &input.file_name);

                let report = classify_with_retry(
                    classifier.as_ref(),
                    &input.bytes,
                    &media,
                    &input.file_name,
                    *max_attempts,
                )?;
                SensitiveData::Classified(report)
            }
            Detector::Local(extractor) => {
                let matches = match media.kind() {
                    MediaKind::Text => {
                        advance(state, ScanState::Routed, &input.file_name);
                        advance(state, ScanState::Extracting, &input.file_name);
                        scan_bytes(&input.bytes).map_err(|e| ScanError::ContentRead(e.to_string()))?
                    }
                    MediaKind::Image => {
                        advance(state, ScanState::Routed, &input.file_name);
                        advance(state, ScanState::Extracting, &input.file_name);
                        merge_results([
                            scan_bytes_lossy(&input.bytes),
                            extractor.perform_ocr_scan(&input.bytes),
                        ])
                    }
                    MediaKind::Pdf | MediaKind::Unsupported => {
                        return Err(ScanError::UnsupportedFileType(media.to_string()));
                    }
                };
                SensitiveData::Matches(matches)
            }
        };

        let encoded_content = encode_content(&input.bytes)?;
        advance(state, ScanState::Validated, &input.file_name);

        let record = ScanRecord {
            file_name: input.file_name.clone(),
            media_type: media.to_string(),
            sensitive_data,
            encoded_content,
            created_at: Utc::now(),
        };
        let id = self.store.create(&record)?;
        advance(state, ScanState::Persisted, &input.file_name);

        Ok(ScanOutcome { id, record })
    }
}

fn advance(state: &mut ScanState, next: ScanState, file_name: &str) {
    tracing::debug!(file_name, from = %state, to = %next, "Scan state transition");
    *state = next;
}

/// Base64 of the original upload, as stored alongside the findings.
pub fn encode_content(bytes: &[u8]) -> Result<String, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::Encoding("no content to encode".into()));
    }
    Ok(BASE64.encode(bytes))
}

/// Run a scan on the blocking thread pool, for async callers.
pub async fn scan_blocking_task(
    processor: Arc<ScanProcessor>,
    input: ScanInput,
) -> Result<ScanOutcome, ScanError> {
    tokio::task::spawn_blocking(move || processor.scan(input))
        .await
        .map_err(|e| ScanError::Task(e.to_string()))?
}

/// Wire a processor from configuration: SQLite store plus the configured
/// detection strategy.
pub fn build_processor(config: &ScanConfig) -> Result<ScanProcessor, BuildError> {
    let store: Arc<dyn ScanStore + Send + Sync> =
        Arc::new(SqliteScanStore::open(&config.database_path)?);

    let processor = match config.strategy {
        ScanStrategy::Remote => {
            let client = GeminiClient::new(config.gemini_settings()?)?;
            tracing::info!(model = client.model(), "Using remote classifier");
            ScanProcessor::remote(Box::new(client), store).with_max_attempts(config.max_attempts)
        }
        ScanStrategy::Local => {
            let engine = default_engine(config.tessdata_dir.as_deref())?;
            tracing::info!("Using local pattern detection");
            ScanProcessor::local(TextExtractor::new(engine), store)
        }
    };

    Ok(processor)
}
