//! Media type handling: declared type parsing, routing category, and
//! magic-byte sniffing for uploads declared as `application/octet-stream`.

/// Broad file categories the pipeline routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Text,
    Unsupported,
}

/// Image formats the remote classifier accepts inline.
pub const CLASSIFIABLE_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// A declared media type, reduced to its essence (`type/subtype`, lower-case,
/// parameters dropped) plus the routing category derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    kind: MediaKind,
}

impl MediaType {
    pub fn parse(declared: &str) -> Self {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let kind = if essence == "application/pdf" {
            MediaKind::Pdf
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            MediaKind::Image
        } else if essence.starts_with("text/") && essence.len() > "text/".len() {
            MediaKind::Text
        } else {
            MediaKind::Unsupported
        };

        Self { essence, kind }
    }

    /// Parse the declared type, falling back to content sniffing when the
    /// uploader gave no useful type.
    pub fn resolve(declared: &str, bytes: &[u8]) -> Self {
        let parsed = Self::parse(declared);
        let generic = parsed.essence.is_empty() || parsed.essence == "application/octet-stream";
        if generic {
            if let Some(sniffed) = sniff(bytes) {
                tracing::debug!(declared, sniffed, "Media type resolved from content");
                return Self::parse(sniffed);
            }
        }
        parsed
    }

    pub fn as_str(&self) -> &str {
        &self.essence
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == MediaKind::Pdf
    }

    /// Whether the remote classifier accepts this image format inline.
    pub fn is_classifiable_image(&self) -> bool {
        self.is_image() && CLASSIFIABLE_IMAGE_TYPES.contains(&self.essence.as_str())
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.essence)
    }
}

/// Detect a media type from magic bytes (NOT file extensions).
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // WEBP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        // HEIC/HEIF: "ftyp" box at offset 4
        _ if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" => match &bytes[8..12] {
            b"heic" | b"heix" | b"hevc" | b"hevx" => Some("image/heic"),
            b"mif1" | b"msf1" => Some("image/heif"),
            _ => None,
        },
        _ => None,
    }
}
