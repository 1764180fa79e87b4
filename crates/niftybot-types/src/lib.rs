//! `niftybot-types` – shared vocabulary of the perception pipeline.
//!
//! Frames flow in from the camera, [`FeatureRecord`]s flow out to the
//! decision layer and the dashboard.  Every crate in the workspace speaks in
//! these types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Frames
// ────────────────────────────────────────────────────────────────────────────

/// Pixel layout of a [`Frame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorEncoding {
    /// 3 bytes per pixel, red first.
    Rgb24,
    /// 3 bytes per pixel, blue first (OpenCV order).
    Bgr24,
    /// 1 byte per pixel.
    Gray8,
}

impl ColorEncoding {
    /// Number of bytes used by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorEncoding::Rgb24 | ColorEncoding::Bgr24 => 3,
            ColorEncoding::Gray8 => 1,
        }
    }
}

/// One immutable snapshot of camera input.
///
/// The pixel buffer is reference counted, so cloning a frame to hand it to a
/// detection worker never copies pixels and no holder can mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    encoding: ColorEncoding,
}

impl Frame {
    /// Wrap a raw pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::MalformedFrame`] when `data` is not exactly
    /// `width * height * bytes_per_pixel` bytes long.
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        encoding: ColorEncoding,
    ) -> Result<Self, VisionError> {
        let data = data.into();
        let expected = width as usize * height as usize * encoding.bytes_per_pixel();
        if data.len() != expected {
            return Err(VisionError::MalformedFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            encoding,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn encoding(&self) -> ColorEncoding {
        self.encoding
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detected features
// ────────────────────────────────────────────────────────────────────────────

/// Opaque token a classifier may attach to a detection so that callers can
/// correlate it with classifier-side state.  The pipeline never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectorHandle(pub u64);

/// One detected region, in the coordinate space of the original frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub height: f32,
    pub width: f32,
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub center_x: f32,
    pub center_y: f32,
    /// Classifier-specific handle, if the classifier produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<DetectorHandle>,
}

/// Read-only result of one detection pass as handed to consumers.
///
/// Cheap to clone; the order of records is whatever the classifier produced.
pub type FeatureSet = Arc<[FeatureRecord]>;

/// An empty [`FeatureSet`].
pub fn empty_features() -> FeatureSet {
    Vec::<FeatureRecord>::new().into()
}

// ────────────────────────────────────────────────────────────────────────────
// Target feature labels
// ────────────────────────────────────────────────────────────────────────────

/// Cascade names the classifier knows how to look for.
pub const KNOWN_FEATURES: &[&str] = &[
    "eye",
    "face",
    "face2",
    "face3",
    "face4",
    "fullbody",
    "glasses",
    "lefteye",
    "left_ear",
    "left_eye2",
    "lower_body",
    "mouth",
    "nose",
    "profile",
    "right_ear",
    "right_eye",
    "right_eye2",
    "two_eyes_big",
    "two_eyes_small",
    "upper_body",
    "upper_body2",
];

/// A validated target-feature label, e.g. `"upper_body"` or `"face"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetFeature(String);

impl TargetFeature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TargetFeature {
    fn default() -> Self {
        Self("upper_body".to_string())
    }
}

impl FromStr for TargetFeature {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if KNOWN_FEATURES.contains(&s) {
            Ok(Self(s.to_string()))
        } else {
            Err(VisionError::UnknownFeature(s.to_string()))
        }
    }
}

impl TryFrom<String> for TargetFeature {
    type Error = VisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetFeature> for String {
    fn from(value: TargetFeature) -> Self {
        value.0
    }
}

impl fmt::Display for TargetFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by the camera layer and the detection pipeline.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Unknown target feature: {0:?}")]
    UnknownFeature(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider already started")]
    AlreadyStarted,

    #[error("Failed to spawn detection worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_buffer_length() {
        let err = Frame::new(vec![0u8; 10], 2, 2, ColorEncoding::Rgb24).unwrap_err();
        match err {
            VisionError::MalformedFrame { expected, actual } => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn frame_clone_shares_pixels() {
        let frame = Frame::new(vec![7u8; 4], 2, 2, ColorEncoding::Gray8).unwrap();
        let copy = frame.clone();
        assert_eq!(frame.data().as_ptr(), copy.data().as_ptr());
        assert_eq!(copy.size(), (2, 2));
        assert_eq!(copy.encoding(), ColorEncoding::Gray8);
    }

    #[test]
    fn target_feature_accepts_known_labels() {
        let label: TargetFeature = "face".parse().unwrap();
        assert_eq!(label.as_str(), "face");
        assert_eq!(TargetFeature::default().as_str(), "upper_body");
    }

    #[test]
    fn target_feature_rejects_unknown_labels() {
        let err = "tail".parse::<TargetFeature>().unwrap_err();
        assert!(err.to_string().contains("tail"));
    }

    #[test]
    fn target_feature_deserialization_is_validated() {
        let ok: TargetFeature = serde_json::from_str("\"lower_body\"").unwrap();
        assert_eq!(ok.to_string(), "lower_body");
        assert!(serde_json::from_str::<TargetFeature>("\"wheel\"").is_err());
    }

    #[test]
    fn feature_record_omits_missing_handle() {
        let record = FeatureRecord {
            height: 20.0,
            width: 10.0,
            top_left_x: 95.0,
            top_left_y: 40.0,
            center_x: 100.0,
            center_y: 50.0,
            handle: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("handle"));
        let back: FeatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn vision_error_display() {
        let err = VisionError::HardwareFault {
            component: "front_cam".to_string(),
            details: "unplugged".to_string(),
        };
        assert!(err.to_string().contains("front_cam"));
        assert!(VisionError::AlreadyStarted.to_string().contains("already"));
    }
}
