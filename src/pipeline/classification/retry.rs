use super::parser::parse_classifier_response;
use super::types::RemoteClassifier;
use super::ClassificationError;
use crate::models::ClassificationReport;
use crate::pipeline::media::MediaType;

/// Per-scan attempt bookkeeping. Owned by a single invocation.
#[derive(Debug)]
pub struct RetryState {
    pub attempt: usize,
    pub max_attempts: usize,
    pub last_error: Option<ClassificationError>,
}

impl RetryState {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    fn record_failure(&mut self, error: ClassificationError) {
        self.last_error = Some(error);
    }

    fn into_exhausted(self, file_name: &str) -> ClassificationError {
        ClassificationError::Exhausted {
            file_name: file_name.to_string(),
            attempts: self.attempt,
            source: Box::new(
                self.last_error
                    .unwrap_or(ClassificationError::EmptyResponse),
            ),
        }
    }
}

/// Call the classifier and validate its reply, retrying up to
/// `max_attempts` times.
///
/// Attempts run back to back, with no delay. Call and parse failures both
/// consume an attempt. A non-transient failure ends the loop early.
pub fn classify_with_retry(
    classifier: &dyn RemoteClassifier,
    content: &[u8],
    media: &MediaType,
    file_name: &str,
    max_attempts: usize,
) -> Result<ClassificationReport, ClassificationError> {
    let mut state = RetryState::new(max_attempts);

    while state.can_retry() {
        state.attempt += 1;

        let outcome = classifier
            .classify(content, media)
            .and_then(|raw| parse_classifier_response(&raw));

        match outcome {
            Ok(report) => {
                tracing::info!(
                    file_name,
                    attempt = state.attempt,
                    "Classification succeeded"
                );
                return Ok(report);
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    file_name,
                    attempt = state.attempt,
                    max_attempts = state.max_attempts,
                    error = %e,
                    "Classification attempt failed"
                );
                state.record_failure(e);
            }
            Err(e) => {
                tracing::warn!(
                    file_name,
                    attempt = state.attempt,
                    error = %e,
                    "Classification failed, not retryable"
                );
                state.record_failure(e);
                break;
            }
        }
    }

    tracing::error!(
        file_name,
        attempts = state.attempt,
        "Classification attempts exhausted"
    );
    Err(state.into_exhausted(file_name))
}
