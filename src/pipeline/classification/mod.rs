pub mod types;
pub mod prompt;
pub mod parser;
pub mod retry;
pub mod gemini;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use retry::*;
pub use gemini::*;

use thiserror::Error;

/// Attempts made per file before the scan is abandoned.
pub const MAX_RETRIES: usize = 3;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Classifier request failed: {0}")]
    Http(String),

    #[error("Classifier returned error (status {status}): {body}")]
    ClassifierCall { status: u16, body: String },

    #[error("Classifier returned no candidates")]
    EmptyResponse,

    #[error("Document upload failed: {0}")]
    Upload(String),

    #[error("Classifier response is not valid JSON: {0}")]
    ValidationParse(String),

    #[error("Image type not accepted by the classifier: {0}")]
    UnsupportedImage(String),

    #[error("Classification of {file_name} failed after {attempts} attempt(s)")]
    Exhausted {
        file_name: String,
        attempts: usize,
        #[source]
        source: Box<ClassificationError>,
    },
}

impl ClassificationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::ClassifierCall { .. }
                | Self::EmptyResponse
                | Self::Upload(_)
                | Self::ValidationParse(_)
        )
    }
}
