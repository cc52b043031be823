use super::rules::rules;
use super::DetectionError;
use crate::models::FieldMatch;

/// Run every rule over `text`, one entry per rule that matched at least once.
/// Counts are non-overlapping matches anywhere in the text.
pub fn scan_text(text: &str) -> Vec<FieldMatch> {
    rules()
        .iter()
        .filter_map(|rule| {
            let count = rule.pattern.find_iter(text).count();
            (count > 0).then(|| FieldMatch {
                type_name: rule.type_name().to_string(),
                category: rule.category,
                count,
            })
        })
        .collect()
}

/// Scan raw bytes that are expected to be UTF-8 text.
pub fn scan_bytes(bytes: &[u8]) -> Result<Vec<FieldMatch>, DetectionError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DetectionError::ContentRead(format!("content is not UTF-8 text: {e}")))?;
    Ok(scan_text(text))
}

/// Best-effort variant of [`scan_bytes`]: invalid UTF-8 sequences are
/// replaced rather than rejected, so binary content still gets scanned for
/// any text it embeds.
pub fn scan_bytes_lossy(bytes: &[u8]) -> Vec<FieldMatch> {
    scan_text(&String::from_utf8_lossy(bytes))
}
