use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the serde name of each variant.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Category {
    Pii => "PII",
    Phi => "PHI",
    Pci => "PCI",
    Unknown => "Unknown",
});

str_enum!(DetectorKind {
    PanCard => "PAN_CARD",
    Ssn => "SSN",
    MedicalRecord => "MEDICAL_RECORD",
    CreditCard => "CREDIT_CARD",
    HealthInsurance => "HEALTH_INSURANCE",
});

str_enum!(ScanStrategy {
    Remote => "remote",
    Local => "local",
});

impl DetectorKind {
    /// Sensitivity category this detector reports under.
    pub fn category(&self) -> Category {
        match self {
            Self::PanCard | Self::Ssn => Category::Pii,
            Self::MedicalRecord | Self::HealthInsurance => Category::Phi,
            Self::CreditCard => Category::Pci,
        }
    }
}

impl Category {
    /// The three categories the remote classifier is asked to fill.
    pub const TARGETS: [Category; 3] = [Category::Pii, Category::Phi, Category::Pci];
}

impl Default for ScanStrategy {
    fn default() -> Self {
        Self::Remote
    }
}
