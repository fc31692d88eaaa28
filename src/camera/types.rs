//! Camera types and error definitions

use std::fmt;
use std::str::FromStr;

/// Which physical side of the device a camera points toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingDirection {
    /// Back camera, pointing away from the user
    Environment,
    /// Front camera, pointing toward the user
    User,
}

impl fmt::Display for FacingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingDirection::Environment => write!(f, "environment"),
            FacingDirection::User => write!(f, "user"),
        }
    }
}

impl FromStr for FacingDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "environment" | "back" | "rear" => Ok(FacingDirection::Environment),
            "user" | "front" => Ok(FacingDirection::User),
            other => Err(format!(
                "unknown facing direction '{}' (expected 'environment' or 'user')",
                other
            )),
        }
    }
}

/// Declarative camera selection preference
///
/// Constructed once per acquisition and never mutated. When
/// `preferred_device_id` is set it takes precedence over the facing
/// direction, so callers can enumerate devices first and pick one by
/// label.
#[derive(Debug, Clone)]
pub struct CameraPreference {
    pub facing: FacingDirection,
    /// Fail rather than substitute another camera when no facing match exists
    pub strict: bool,
    /// Exact device to open, bypassing facing resolution
    pub preferred_device_id: Option<String>,
    /// Resolution hint (ideal, not exact)
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl CameraPreference {
    pub fn new(facing: FacingDirection, strict: bool, ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            facing,
            strict,
            preferred_device_id: None,
            ideal_width,
            ideal_height,
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.preferred_device_id = Some(device_id.into());
        self
    }
}

/// Lifecycle state of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    #[default]
    Idle,
    Acquiring,
    Active,
    Failed,
}

/// Which branch of the two-step acquisition policy produced the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// The exact request (device id, or strict facing match) succeeded
    Exact,
    /// A soft-hint request succeeded, possibly with a substituted camera
    SoftHint,
}

/// A camera input device as reported by the enumeration capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    /// Human-readable label; may be empty before a permission grant
    pub label: String,
}

/// One raw frame read from a live stream at native resolution
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8 pixels, row-major
    pub rgb: Vec<u8>,
}

/// Encoded still image produced by `CameraSession::capture_frame`
#[derive(Debug, Clone)]
pub struct EncodedPhoto {
    /// PNG-encoded image data
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Errors that can occur while acquiring or using a camera
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Camera access denied: {0}")]
    AcquisitionDenied(String),

    #[error("No camera matches the requested facing direction")]
    AcquisitionUnavailable,

    #[error("No camera session is active")]
    NotActive,

    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Failed to encode captured frame: {0}")]
    Encode(String),
}
