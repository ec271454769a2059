//! Style reference records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::StyleReferenceId;

/// Pixel dimensions of a reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Aspect ratio as a display string, e.g. "16:9".
    pub fn aspect_ratio(&self) -> String {
        if self.width == 0 || self.height == 0 {
            return "0:0".to_string();
        }
        let g = gcd(self.width, self.height);
        format!("{}:{}", self.width / g, self.height / g)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// An image (and its metadata) used to condition generation toward a target
/// visual style.
///
/// Immutable once created: a new reference is a new record, never mutated in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StyleReference {
    /// Unique reference ID
    pub id: StyleReferenceId,

    /// Video asset the frame was extracted from, if any (sessions created
    /// from a still image have no source video)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_video_id: Option<String>,

    /// URL of the extracted frame
    pub frame_url: String,

    /// Timestamp within the source video the frame came from (seconds)
    #[serde(default)]
    pub frame_timestamp: f64,

    /// Frame dimensions
    pub resolution: Resolution,

    /// Aspect ratio display string ("16:9")
    pub aspect_ratio: String,

    /// Opaque analysis metadata (palette, dominant colors, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_metadata: Option<serde_json::Value>,

    /// Extraction timestamp
    pub extracted_at: DateTime<Utc>,
}

impl StyleReference {
    /// Build a new reference for a frame at the given URL.
    pub fn new(frame_url: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            id: StyleReferenceId::new(),
            source_video_id: None,
            frame_url: frame_url.into(),
            frame_timestamp: 0.0,
            aspect_ratio: resolution.aspect_ratio(),
            resolution,
            analysis_metadata: None,
            extracted_at: Utc::now(),
        }
    }

    pub fn with_source_video(mut self, video_id: impl Into<String>, timestamp: f64) -> Self {
        self.source_video_id = Some(video_id.into());
        self.frame_timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio() {
        let r = Resolution {
            width: 1920,
            height: 1080,
        };
        assert_eq!(r.aspect_ratio(), "16:9");

        let r = Resolution {
            width: 1080,
            height: 1920,
        };
        assert_eq!(r.aspect_ratio(), "9:16");
    }

    #[test]
    fn test_new_reference_derives_aspect() {
        let r = StyleReference::new(
            "https://cdn/frame.png",
            Resolution {
                width: 1280,
                height: 720,
            },
        );
        assert_eq!(r.aspect_ratio, "16:9");
        assert!(r.source_video_id.is_none());
    }
}
