//! Simulated camera for CI and headless runs.
//!
//! [`SimCamera`] produces RGB frames whose every byte is the low 8 bits of a
//! running frame counter, so tests can tell frames apart and check that the
//! newest one was delivered.
//!
//! # Example
//!
//! ```rust
//! use niftybot_hal::{CameraFeed, FrameSource, SimCamera};
//!
//! let feed = CameraFeed::new(Box::new(SimCamera::new("front", 8, 6)));
//! let frame = feed.capture_frame().expect("sim capture must succeed");
//! assert_eq!(frame.size(), (8, 6));
//! ```

use niftybot_types::{ColorEncoding, Frame, VisionError};

use crate::camera::Camera;

/// A simulated camera that returns synthetic frames of a fixed size.
/// Always succeeds.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    frames_captured: u64,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            frames_captured: 0,
        }
    }

    /// Number of frames handed out so far.
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<Frame, VisionError> {
        self.frames_captured += 1;
        let len = self.width as usize * self.height as usize * 3;
        let fill = (self.frames_captured & 0xff) as u8;
        Frame::new(vec![fill; len], self.width, self.height, ColorEncoding::Rgb24)
    }
}
