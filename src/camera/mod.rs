//! Camera session management
//!
//! A `CameraSession` owns at most one live camera stream, acquired
//! through an explicit two-step policy: a strict facing-matched request
//! first, then at most one retry with the facing direction downgraded
//! to a soft hint. Failures past that are terminal and surfaced to the
//! caller. The session also turns live frames into PNG-encoded stills.

mod backend;
mod devices;
mod types;

pub use backend::{CameraBackend, CameraStream, NokhwaBackend, StreamRequest};
pub use devices::find_preferred_device;
pub use types::{
    AcquisitionOutcome, CameraError, CameraPreference, CameraState, CapturedFrame, DeviceInfo,
    EncodedPhoto, FacingDirection,
};

use std::io::Cursor;
use tracing::{info, warn};

/// Holds the state of a camera session
///
/// Exactly one stream may be alive per session; acquiring while a
/// stream is held releases the previous one first.
pub struct CameraSession {
    backend: Box<dyn CameraBackend>,
    stream: Option<Box<dyn CameraStream>>,
    state: CameraState,
}

impl CameraSession {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            stream: None,
            state: CameraState::Idle,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.state == CameraState::Active
    }

    /// List the camera devices the host exposes
    pub fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.backend.enumerate()
    }

    /// Acquire a live stream matching the preference.
    ///
    /// A previously held stream is released first. On success the
    /// session is Active and the returned tag records which branch of
    /// the policy produced the stream; on failure the session is Failed
    /// and holds no stream.
    pub fn acquire(
        &mut self,
        preference: &CameraPreference,
    ) -> Result<AcquisitionOutcome, CameraError> {
        if self.stream.is_some() {
            self.release();
        }
        self.state = CameraState::Acquiring;

        match self.run_acquisition_policy(preference) {
            Ok((stream, outcome)) => {
                self.stream = Some(stream);
                self.state = CameraState::Active;
                info!(facing = %preference.facing, ?outcome, "Camera acquired");
                Ok(outcome)
            }
            Err(e) => {
                self.state = CameraState::Failed;
                Err(e)
            }
        }
    }

    /// Two-step acquisition: exact request, then at most one soft retry
    fn run_acquisition_policy(
        &self,
        preference: &CameraPreference,
    ) -> Result<(Box<dyn CameraStream>, AcquisitionOutcome), CameraError> {
        // An explicit device id takes precedence over facing resolution
        if let Some(ref id) = preference.preferred_device_id {
            let stream = self.backend.open(&StreamRequest {
                device_id: Some(id.clone()),
                ideal_width: preference.ideal_width,
                ideal_height: preference.ideal_height,
            })?;
            return Ok((stream, AcquisitionOutcome::Exact));
        }

        if preference.strict {
            match self.open_strict(preference) {
                Ok(stream) => return Ok((stream, AcquisitionOutcome::Exact)),
                Err(e) => {
                    warn!(
                        facing = %preference.facing,
                        "Strict camera request failed ({}), retrying with soft hint",
                        e
                    );
                }
            }
        }

        let stream = self.open_soft(preference)?;
        Ok((stream, AcquisitionOutcome::SoftHint))
    }

    /// Strict request: the facing direction must resolve to a device
    fn open_strict(
        &self,
        preference: &CameraPreference,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let devices = self.backend.enumerate()?;
        let device = find_preferred_device(&devices, preference.facing)
            .ok_or(CameraError::AcquisitionUnavailable)?;

        self.backend.open(&StreamRequest {
            device_id: Some(device.id.clone()),
            ideal_width: preference.ideal_width,
            ideal_height: preference.ideal_height,
        })
    }

    /// Soft request: prefer a facing-matched device, otherwise let the
    /// host pick. A single open attempt; failure is terminal.
    fn open_soft(
        &self,
        preference: &CameraPreference,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let device_id = self
            .backend
            .enumerate()
            .ok()
            .and_then(|devices| {
                find_preferred_device(&devices, preference.facing).map(|d| d.id.clone())
            });

        self.backend.open(&StreamRequest {
            device_id,
            ideal_width: preference.ideal_width,
            ideal_height: preference.ideal_height,
        })
    }

    /// Stop every track of the held stream and return to Idle.
    ///
    /// Idempotent: safe to call when no stream is held. Must be invoked
    /// on teardown.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Camera stream released");
        }
        self.state = CameraState::Idle;
    }

    /// Encode the currently presented frame as a PNG still.
    ///
    /// Reads at the stream's native resolution. Fails with `NotActive`
    /// when no stream is held; does not change the session state.
    pub fn capture_frame(&mut self) -> Result<EncodedPhoto, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::NotActive)?;
        let frame = stream.read_frame()?;
        encode_png(&frame)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn encode_png(frame: &CapturedFrame) -> Result<EncodedPhoto, CameraError> {
    let image: image::RgbImage =
        image::ImageBuffer::from_raw(frame.width, frame.height, frame.rgb.clone())
            .ok_or_else(|| CameraError::Encode("frame buffer size mismatch".to_string()))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| CameraError::Encode(e.to_string()))?;

    Ok(EncodedPhoto {
        png,
        width: frame.width,
        height: frame.height,
    })
}
