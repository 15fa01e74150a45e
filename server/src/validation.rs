use pitch_core::editor::{MAX_SCALE, MIN_SCALE};
use uuid::Uuid;

use crate::error::ApiError;

/// Tallest canvas a request may ask for
const MAX_CANVAS_HEIGHT: u32 = 2048;
/// Pixel budget for a single rendered frame
const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Validate the zoom factor of a render request.
///
/// Zoom only ever doubles or halves from 1, so anything that is not a power
/// of two inside the editor's bounds is rejected.
pub fn validate_scale(scale: f64) -> Result<(), ApiError> {
    if !scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
        return Err(ApiError::InvalidInput(format!(
            "Scale must be between {} and {}",
            MIN_SCALE, MAX_SCALE
        )));
    }
    if scale.log2().fract() != 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "Scale must be a power of two, got {}",
            scale
        )));
    }
    Ok(())
}

pub fn validate_canvas_height(height: u32) -> Result<(), ApiError> {
    if height == 0 || height > MAX_CANVAS_HEIGHT {
        return Err(ApiError::InvalidInput(format!(
            "Canvas height must be between 1 and {}",
            MAX_CANVAS_HEIGHT
        )));
    }
    Ok(())
}

/// Reject frames too large to allocate.
pub fn validate_canvas_size(width: u32, height: u32) -> Result<(), ApiError> {
    if width as u64 * height as u64 > MAX_CANVAS_PIXELS {
        return Err(ApiError::InvalidInput(format!(
            "Canvas {}x{} exceeds the {} pixel limit",
            width, height, MAX_CANVAS_PIXELS
        )));
    }
    Ok(())
}

/// Parse a session id from a path segment.
pub fn parse_session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidInput(format!("Invalid session id: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scale() {
        assert!(validate_scale(1.0).is_ok());
        assert!(validate_scale(0.5).is_ok());
        assert!(validate_scale(64.0).is_ok());
        assert!(validate_scale(1.0 / 16.0).is_ok());

        let result = validate_scale(3.0);
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("power of two"));
        } else {
            panic!("expected InvalidInput");
        }

        assert!(validate_scale(128.0).is_err());
        assert!(validate_scale(0.0).is_err());
        assert!(validate_scale(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_canvas_height() {
        assert!(validate_canvas_height(256).is_ok());
        assert!(validate_canvas_height(0).is_err());
        assert!(validate_canvas_height(4096).is_err());
    }

    #[test]
    fn test_validate_canvas_size() {
        assert!(validate_canvas_size(10_000, 256).is_ok());
        assert!(validate_canvas_size(1_000_000, 2048).is_err());
    }

    #[test]
    fn test_parse_session_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(parse_session_id("not-a-uuid").is_err());
    }
}
