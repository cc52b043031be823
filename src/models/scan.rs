use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::Category;

/// Detected fields for one category, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// Count of one detector's matches within a single content blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    #[serde(rename = "type")]
    pub type_name: String,
    pub category: Category,
    pub count: usize,
}

/// Parsed output of the remote classifier.
///
/// `PII`, `PHI` and `PCI` are present only when the classifier populated
/// them. Any other top-level key the classifier emitted lands in
/// `additional` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(rename = "PII", default, skip_serializing_if = "Option::is_none")]
    pub pii: Option<FieldMap>,
    #[serde(rename = "PHI", default, skip_serializing_if = "Option::is_none")]
    pub phi: Option<FieldMap>,
    #[serde(rename = "PCI", default, skip_serializing_if = "Option::is_none")]
    pub pci: Option<FieldMap>,
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

impl ClassificationReport {
    pub fn fields_mut(&mut self, category: Category) -> Option<&mut Option<FieldMap>> {
        match category {
            Category::Pii => Some(&mut self.pii),
            Category::Phi => Some(&mut self.phi),
            Category::Pci => Some(&mut self.pci),
            Category::Unknown => None,
        }
    }

    /// True when no category, known or additional, was reported.
    pub fn is_empty(&self) -> bool {
        self.pii.is_none() && self.phi.is_none() && self.pci.is_none() && self.additional.is_empty()
    }
}

/// What a scan found, depending on which detection strategy ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensitiveData {
    Matches(Vec<FieldMatch>),
    Classified(ClassificationReport),
}

/// A completed scan, ready to hand to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub file_name: String,
    pub media_type: String,
    pub sensitive_data: SensitiveData,
    /// Base64 of the original uploaded bytes.
    pub encoded_content: String,
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn summary(&self, id: Uuid) -> ScanSummary {
        ScanSummary {
            id,
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            sensitive_data: self.sensitive_data.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing view of a stored scan (no raw content).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub id: Uuid,
    pub file_name: String,
    pub media_type: String,
    pub sensitive_data: SensitiveData,
    pub created_at: DateTime<Utc>,
}

/// One page of scan summaries, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage {
    pub results: Vec<ScanSummary>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_results: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_serializes_only_populated_categories() {
        let mut pci = FieldMap::new();
        pci.insert("cardNumber".into(), json!("4111111111111111"));
        let report = ClassificationReport {
            pci: Some(pci),
            ..Default::default()
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"PCI": {"cardNumber": "4111111111111111"}}));
    }

    #[test]
    fn report_keeps_additional_categories() {
        let report: ClassificationReport = serde_json::from_value(json!({
            "PII": {"name": "Jane Doe"},
            "Biometric": {"fingerprint": "present"}
        }))
        .unwrap();

        assert_eq!(report.pii.as_ref().unwrap()["name"], "Jane Doe");
        assert!(report.phi.is_none());
        assert_eq!(report.additional["Biometric"]["fingerprint"], "present");
    }

    #[test]
    fn empty_report_is_empty() {
        assert!(ClassificationReport::default().is_empty());
        let report = ClassificationReport {
            pii: Some(FieldMap::new()),
            ..Default::default()
        };
        assert!(!report.is_empty());
    }

    #[test]
    fn sensitive_data_distinguishes_matches_from_report() {
        let matches: SensitiveData = serde_json::from_value(json!([
            {"type": "SSN", "category": "PII", "count": 2}
        ]))
        .unwrap();
        assert!(matches!(matches, SensitiveData::Matches(ref m) if m[0].count == 2));

        let classified: SensitiveData =
            serde_json::from_value(json!({"PHI": {"mrn": "12345678"}})).unwrap();
        assert!(matches!(classified, SensitiveData::Classified(ref r) if r.phi.is_some()));
    }
}
