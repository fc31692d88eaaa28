//! Camera backend abstraction
//!
//! Separates the acquisition policy from the host camera capability so
//! the state machine can be exercised against synthetic device sets.
//! The production backend uses nokhwa for cross-platform capture.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{query, Camera};
use tracing::info;

use super::types::{CameraError, CapturedFrame, DeviceInfo};

/// Parameters for opening a single camera stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Exact device to open; `None` opens the host default camera
    pub device_id: Option<String>,
    /// Resolution hint (ideal, not exact)
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// Host camera capability: device enumeration and stream acquisition
pub trait CameraBackend: Send + Sync {
    /// List the camera-kind input devices exposed by the host
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    /// Open a live stream for the requested device
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live camera stream handle
///
/// Owned exclusively by the session that acquired it. Dropping the
/// handle stops the stream.
pub trait CameraStream: Send {
    /// Read the currently presented frame at native resolution
    fn read_frame(&mut self) -> Result<CapturedFrame, CameraError>;

    /// Stop every track of the stream; further reads fail
    fn stop(&mut self);
}

/// nokhwa-backed camera capability
pub struct NokhwaBackend;

impl CameraBackend for NokhwaBackend {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let devices =
            query(ApiBackend::Auto).map_err(|e| CameraError::Enumeration(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|info| DeviceInfo {
                id: index_to_id(info.index()),
                label: info.human_name(),
            })
            .collect())
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let index = match &request.device_id {
            Some(id) => id_to_index(id),
            None => CameraIndex::Index(0),
        };

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(request.ideal_width, request.ideal_height),
                FrameFormat::MJPEG,
                30,
            ),
        ));

        let mut camera = Camera::new(index, requested).map_err(map_open_error)?;
        camera.open_stream().map_err(map_open_error)?;

        let resolution = camera.resolution();
        info!(
            width = resolution.width(),
            height = resolution.height(),
            "Camera stream opened"
        );

        Ok(Box::new(NokhwaStream {
            camera,
            stopped: false,
        }))
    }
}

/// Live stream handle around an opened nokhwa camera
struct NokhwaStream {
    camera: Camera,
    stopped: bool,
}

impl CameraStream for NokhwaStream {
    fn read_frame(&mut self) -> Result<CapturedFrame, CameraError> {
        if self.stopped {
            return Err(CameraError::NotActive);
        }

        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Capture(e.to_string()))?;

        Ok(CapturedFrame {
            width: decoded.width(),
            height: decoded.height(),
            rgb: decoded.into_raw(),
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            let _ = self.camera.stop_stream();
            self.stopped = true;
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn index_to_id(index: &CameraIndex) -> String {
    match index {
        CameraIndex::Index(i) => i.to_string(),
        CameraIndex::String(s) => s.clone(),
    }
}

fn id_to_index(id: &str) -> CameraIndex {
    match id.parse::<u32>() {
        Ok(i) => CameraIndex::Index(i),
        Err(_) => CameraIndex::String(id.to_string()),
    }
}

/// Classify a device-open failure into the acquisition error taxonomy
fn map_open_error(error: nokhwa::NokhwaError) -> CameraError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("not found") || lowered.contains("no device") {
        CameraError::AcquisitionUnavailable
    } else {
        CameraError::AcquisitionDenied(message)
    }
}
