//! Core types for image generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Output dimensions accepted by the generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1024x1024 square.
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    /// 1024x1792 portrait.
    #[serde(rename = "1024x1792")]
    Portrait,
    /// 1792x1024 landscape.
    #[serde(rename = "1792x1024")]
    Landscape,
}

impl ImageSize {
    /// All sizes, in display order.
    pub const ALL: [ImageSize; 3] = [Self::Square, Self::Portrait, Self::Landscape];

    /// Returns the wire value (e.g., "1024x1792").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }

    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Square => "Square",
            Self::Portrait => "Portrait",
            Self::Landscape => "Landscape",
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s || size.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown size '{s}' (expected 1024x1024, 1024x1792 or 1792x1024)"))
    }
}

/// Rendering quality accepted by the generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    /// Let the backend choose.
    #[default]
    Auto,
    /// Fastest, lowest fidelity.
    Low,
    /// Balanced.
    Medium,
    /// Slowest, highest fidelity.
    High,
}

impl ImageQuality {
    /// All qualities, in display order.
    pub const ALL: [ImageQuality; 4] = [Self::Auto, Self::Low, Self::Medium, Self::High];

    /// Returns the wire value (e.g., "high").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|quality| quality.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown quality '{s}' (expected auto, low, medium or high)"))
    }
}

/// A request to generate images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Output dimensions.
    pub size: ImageSize,
    /// Rendering quality.
    pub quality: ImageQuality,
    /// Number of images to generate.
    pub n: u32,
}

impl GenerationRequest {
    /// Creates a single-image request with default size and quality.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: ImageSize::default(),
            quality: ImageQuality::default(),
            n: 1,
        }
    }

    /// Sets the output dimensions.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Sets the rendering quality.
    pub fn with_quality(mut self, quality: ImageQuality) -> Self {
        self.quality = quality;
        self
    }
}

/// One image returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutput {
    /// Where the image can be fetched (`https:` or `data:`).
    pub url: String,
}

impl ImageOutput {
    /// Wraps a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A successfully generated image kept in the session gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Locally assigned identifier, derived from the creation time.
    pub id: String,
    /// Externally hosted resource.
    pub url: String,
    /// Trimmed prompt that produced the image.
    pub prompt: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Requested size.
    pub size: ImageSize,
    /// Requested quality.
    pub quality: ImageQuality,
}
