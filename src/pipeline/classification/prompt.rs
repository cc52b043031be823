/// Instruction sent alongside every file, image or document.
pub const CLASSIFICATION_INSTRUCTION: &str = r#"Analyze the attached file and identify any sensitive data it contains.

Classify findings into these categories:
- PII (Personally Identifiable Information): names, addresses, phone numbers, email addresses, government ID numbers such as SSN or PAN, passport numbers, dates of birth.
- PHI (Protected Health Information): medical record numbers, health insurance IDs, diagnoses, prescriptions, treatment details, lab results.
- PCI (Payment Card Information): card numbers, cardholder names, expiration dates, CVV codes, bank account numbers.

Respond with a single JSON object and nothing else. Use the category names as top-level keys and include a category only if data of that kind was found. Each category maps field names to the values found, for example:
{"PII": {"name": "Jane Doe", "ssn": "123-45-6789"}, "PCI": {"cardNumber": "4111111111111111"}}

If no sensitive data is found, respond with {}."#;
