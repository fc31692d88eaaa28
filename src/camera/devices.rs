//! Device-enumeration helper for facing-direction matching
//!
//! Native hosts do not reliably expose which way a camera faces, so the
//! only portable signal is the device label. Matching is a
//! case-insensitive substring test against a small token table per
//! direction, including the localized tokens external webcams and
//! laptop vendors commonly use.

use super::types::{DeviceInfo, FacingDirection};

/// Label tokens indicating a front-facing (user) camera
const USER_TOKENS: &[&str] = &["front", "user", "facetime", "前面", "フロント", "インカメラ"];

/// Label tokens indicating a back-facing (environment) camera
const ENVIRONMENT_TOKENS: &[&str] = &["back", "rear", "environment", "背面", "リアカメラ"];

/// Find the first camera whose label indicates the requested facing direction.
///
/// Returns `None` when no label matches or labels are unavailable (they
/// may be empty before the first permission grant). Callers treat `None`
/// as a normal outcome and fall back to the host default camera.
pub fn find_preferred_device(
    devices: &[DeviceInfo],
    direction: FacingDirection,
) -> Option<&DeviceInfo> {
    let tokens = match direction {
        FacingDirection::User => USER_TOKENS,
        FacingDirection::Environment => ENVIRONMENT_TOKENS,
    };

    devices.iter().find(|device| {
        if device.label.is_empty() {
            return false;
        }
        let label = device.label.to_lowercase();
        tokens.iter().any(|token| label.contains(token))
    })
}
