use super::ExtractionError;

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean engine confidence, 0.0-1.0. Informational only.
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}
