pub mod types;
pub mod ocr;
pub mod text;

pub use types::*;
pub use ocr::*;
pub use text::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),
}
