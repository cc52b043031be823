use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory. English only by default.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrPageResult { text, confidence })
    }
}

/// Engine used when no OCR backend is available: recognizes nothing.
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Ok(OcrPageResult {
            text: String::new(),
            confidence: 0.0,
        })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

/// Pick the OCR engine for this build: Tesseract when compiled with `ocr`
/// and language data is configured, otherwise the no-op engine.
pub fn default_engine(
    tessdata_dir: Option<&std::path::Path>,
) -> Result<Box<dyn OcrEngine + Send + Sync>, ExtractionError> {
    #[cfg(feature = "ocr")]
    if let Some(dir) = tessdata_dir {
        return Ok(Box::new(BundledTesseract::new(dir)?));
    }

    if let Some(dir) = tessdata_dir {
        tracing::warn!(
            path = %dir.display(),
            "Tessdata configured but OCR support is not compiled in; image text will be empty"
        );
    }
    Ok(Box::new(NoopOcrEngine))
}
