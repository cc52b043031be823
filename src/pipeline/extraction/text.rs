use super::types::OcrEngine;
use crate::models::FieldMatch;
use crate::pipeline::detection::scan_text;

/// Best-effort image-to-text step in front of the local scanner.
///
/// OCR failures degrade to empty text. Low-confidence or garbled output is
/// passed through as-is; only control characters are removed.
pub struct TextExtractor {
    engine: Box<dyn OcrEngine + Send + Sync>,
}

impl TextExtractor {
    pub fn new(engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        Self { engine }
    }

    pub fn extract_text(&self, image_bytes: &[u8]) -> String {
        let _span = tracing::debug_span!("ocr_extract", image_size = image_bytes.len()).entered();

        match self.engine.ocr_image(image_bytes) {
            Ok(page) => {
                tracing::debug!(
                    text_len = page.text.len(),
                    confidence = page.confidence,
                    "OCR extraction complete"
                );
                strip_control_chars(&page.text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OCR scanning error, continuing with empty text");
                String::new()
            }
        }
    }

    /// OCR the image and run the local scanner over whatever came back.
    pub fn perform_ocr_scan(&self, image_bytes: &[u8]) -> Vec<FieldMatch> {
        scan_text(&self.extract_text(image_bytes))
    }
}

/// Drop control characters (NUL, bell, ...) but keep line structure.
fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}
