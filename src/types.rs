use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Binary megabyte used for every size shown to the user.
pub const MEGABYTE: u64 = 1024 * 1024;

/// Output ceiling handed to the compression service.
pub const MAX_OUTPUT_SIZE_MB: f64 = 10.0;

/// Filename of every download, whatever the source name or encoded format.
pub const DOWNLOAD_FILENAME: &str = "compressed_image.jpg";

#[derive(Debug, Clone)]
pub struct OriginalFile {
    pub name: String,
    pub content: Bytes,
    pub mime_type: String,
    pub size: u64,
}

impl OriginalFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
            mime_type: mime_type.into(),
        }
    }

    /// Whether the declared type passes an `image/*` picker filter.
    pub fn is_image(&self) -> bool {
        self.mime_type.to_ascii_lowercase().starts_with("image/")
    }
}

#[derive(Debug, Clone)]
pub struct CompressedFile {
    pub content: Bytes,
    pub mime_type: String,
    pub size: u64,
}

impl CompressedFile {
    pub fn new(content: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            size: content.len() as u64,
            content,
            mime_type: mime_type.into(),
        }
    }
}

/// Compression quality as a whole percentage in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: u8 = 50;

    pub fn new(value: i64) -> Result<Self, PanelError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(PanelError::InvalidQuality { value })
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Quality as the `0..1` fraction the compression service expects.
    pub fn as_fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    pub max_size_mb: f64,
    pub initial_quality: f32,
    pub max_iterations: u32,
}

impl CompressionOptions {
    pub fn for_quality(quality: Quality) -> Self {
        Self {
            initial_quality: quality.as_fraction(),
            ..Self::default()
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * MEGABYTE as f64) as u64
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_size_mb: MAX_OUTPUT_SIZE_MB,
            initial_quality: Quality::default().as_fraction(),
            max_iterations: 10,
        }
    }
}

/// Formats a byte count as binary megabytes with two decimals, e.g. `"5.00 MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MEGABYTE as f64)
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid file content: {message}")]
    InvalidContent { message: String },

    #[error("Compression failed: {message}")]
    CompressionFailed { message: String },

    #[error("Compression task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("A compression is already in progress")]
    AlreadyCompressing,

    #[error("No compressed image available")]
    NoResult,

    #[error("Quality {value} is outside 1-100")]
    InvalidQuality { value: i64 },

    #[error("Not an image: {mime_type}")]
    NotAnImage { mime_type: String },

    #[error("Empty file: {name}")]
    EmptyFile { name: String },

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Deserialize)]
pub struct SelectFileRequest {
    pub name: String,
    pub content: String, // base64 encoded
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
pub struct QualityRequest {
    pub quality: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_accepts_only_one_to_hundred() {
        assert_eq!(Quality::new(1).unwrap().percent(), 1);
        assert_eq!(Quality::new(100).unwrap().percent(), 100);
        assert!(matches!(Quality::new(0), Err(PanelError::InvalidQuality { value: 0 })));
        assert!(matches!(Quality::new(101), Err(PanelError::InvalidQuality { value: 101 })));
        assert_eq!(Quality::default().percent(), 50);
    }

    #[test]
    fn options_follow_selected_quality() {
        let options = CompressionOptions::for_quality(Quality::new(75).unwrap());
        assert!((options.initial_quality - 0.75).abs() < f32::EPSILON);
        assert_eq!(options.max_size_bytes(), 10 * MEGABYTE);
        assert_eq!(options.max_iterations, 10);
    }

    #[test]
    fn megabytes_use_binary_units() {
        assert_eq!(format_megabytes(5 * MEGABYTE), "5.00 MB");
        assert_eq!(format_megabytes(MEGABYTE / 4), "0.25 MB");
        assert_eq!(format_megabytes(0), "0.00 MB");
    }

    #[test]
    fn picker_filter_matches_image_types() {
        assert!(OriginalFile::new("a.png", vec![1u8], "image/png").is_image());
        assert!(OriginalFile::new("a.JPG", vec![1u8], "Image/JPEG").is_image());
        assert!(!OriginalFile::new("a.pdf", vec![1u8], "application/pdf").is_image());
    }
}
