//! Camera driver trait and the shared [`FrameSource`] view over it.

use std::sync::Mutex;

use niftybot_types::{Frame, VisionError};
use tracing::trace;

/// A camera or image-capture device.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Capture and return the most recent frame.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::HardwareFault`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the buffer is unavailable).
    fn capture(&mut self) -> Result<Frame, VisionError>;
}

/// Read-only source of the latest camera frame.
///
/// The detection pipeline shares one source between all of its providers and
/// only ever reads it from the caller's thread, one capture at a time.
/// Implementations must be cheap and must always return the newest frame.
pub trait FrameSource: Send + Sync {
    fn capture_frame(&self) -> Result<Frame, VisionError>;
}

/// Adapts a [`Camera`] driver into a [`FrameSource`].
pub struct CameraFeed {
    camera: Mutex<Box<dyn Camera>>,
}

impl CameraFeed {
    pub fn new(camera: Box<dyn Camera>) -> Self {
        Self {
            camera: Mutex::new(camera),
        }
    }
}

impl FrameSource for CameraFeed {
    fn capture_frame(&self) -> Result<Frame, VisionError> {
        let mut camera = self.camera.lock().map_err(|_| VisionError::HardwareFault {
            component: "camera".to_string(),
            details: "camera lock poisoned by a panicked capture".to_string(),
        })?;
        let frame = camera.capture()?;
        trace!(camera = camera.id(), width = frame.width(), height = frame.height(), "frame captured");
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use niftybot_types::ColorEncoding;

    struct MockCamera {
        id: String,
        captures: u32,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<Frame, VisionError> {
            self.captures += 1;
            Frame::new(vec![self.captures as u8; 2 * 2 * 3], 2, 2, ColorEncoding::Rgb24)
        }
    }

    struct UnpluggedCamera;

    impl Camera for UnpluggedCamera {
        fn id(&self) -> &str {
            "unplugged"
        }

        fn capture(&mut self) -> Result<Frame, VisionError> {
            Err(VisionError::HardwareFault {
                component: "unplugged".to_string(),
                details: "no device".to_string(),
            })
        }
    }

    #[test]
    fn feed_returns_newest_frame_each_call() {
        let feed = CameraFeed::new(Box::new(MockCamera {
            id: "front_rgb".to_string(),
            captures: 0,
        }));
        let first = feed.capture_frame().unwrap();
        let second = feed.capture_frame().unwrap();
        assert_eq!(first.data()[0], 1);
        assert_eq!(second.data()[0], 2);
        assert_eq!(second.size(), (2, 2));
    }

    #[test]
    fn feed_propagates_hardware_faults() {
        let feed = CameraFeed::new(Box::new(UnpluggedCamera));
        let err = feed.capture_frame().unwrap_err();
        assert!(err.to_string().contains("unplugged"));
    }
}
