use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Category, DetectorKind};

/// A named pattern tagged with the sensitivity category it reports under.
pub struct DetectionRule {
    pub kind: DetectorKind,
    pub category: Category,
    pub pattern: Regex,
}

impl DetectionRule {
    pub fn type_name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// The fixed rule set, in scan order.
static RULES: LazyLock<Vec<DetectionRule>> = LazyLock::new(|| {
    vec![
        // Indian PAN: five letters, four digits, one letter
        rule(DetectorKind::PanCard, r"[A-Z]{5}[0-9]{4}[A-Z]{1}"),
        rule(DetectorKind::Ssn, r"\d{3}-\d{2}-\d{4}"),
        rule(DetectorKind::MedicalRecord, r"\b\d{8,10}\b"),
        // 16 digits, optionally grouped by four with dashes or spaces
        rule(DetectorKind::CreditCard, r"\b(?:\d{4}[-\s]?){3}\d{4}\b"),
        rule(DetectorKind::HealthInsurance, r"\b[A-Z]{2}\d{10}\b"),
    ]
});

fn rule(kind: DetectorKind, regex_str: &str) -> DetectionRule {
    DetectionRule {
        kind,
        category: kind.category(),
        pattern: Regex::new(regex_str).expect("Invalid detection regex pattern"),
    }
}

/// All detection rules, in scan order.
pub fn rules() -> &'static [DetectionRule] {
    &RULES
}

/// Category for a detector name. Unrecognized names map to `Unknown`.
pub fn category_for(type_name: &str) -> Category {
    type_name
        .parse::<DetectorKind>()
        .map(|kind| kind.category())
        .unwrap_or(Category::Unknown)
}
