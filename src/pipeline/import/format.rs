use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Upload formats accepted for OCR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Pdf,
    Png,
    Jpeg,
}

impl UploadFormat {
    /// Map a file extension (case-insensitive, no dot) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Detect a format from leading magic bytes.
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        match header {
            // %PDF
            [0x25, 0x50, 0x44, 0x46, ..] => Some(Self::Pdf),
            // 89 50 4E 47 0D 0A 1A 0A
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            // FF D8 FF
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

/// Check an upload before it touches disk: extension allow-list, size
/// limit, then magic bytes. Extensions can lie, so both must agree.
pub fn check_upload(
    filename: &str,
    content: &[u8],
    max_bytes: u64,
) -> Result<UploadFormat, ImportError> {
    let name = sanitize_filename(filename);
    let extension = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let declared = UploadFormat::from_extension(extension).ok_or_else(|| {
        ImportError::UnsupportedFormat(format!(
            "'{name}' (allowed: pdf, png, jpg, jpeg)"
        ))
    })?;

    let size = content.len() as u64;
    if size > max_bytes {
        return Err(ImportError::FileTooLarge {
            size_mb: bytes_to_mb(size),
            max_mb: bytes_to_mb(max_bytes),
        });
    }
    if content.is_empty() {
        return Err(ImportError::EmptyFile);
    }

    match UploadFormat::from_magic(content) {
        Some(detected) if detected == declared => {
            tracing::debug!(
                file = %name,
                format = declared.mime_type(),
                size,
                "Upload accepted"
            );
            Ok(declared)
        }
        _ => Err(ImportError::ContentMismatch {
            extension: extension.to_ascii_lowercase(),
        }),
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "document".to_string()
    } else {
        clean
    }
}
