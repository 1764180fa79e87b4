//! `niftybot-hal` – camera hardware boundary.
//!
//! # Modules
//!
//! - [`camera`] – the [`Camera`][camera::Camera] driver trait and
//!   [`CameraFeed`][camera::CameraFeed], which turns any driver into the
//!   shared [`FrameSource`][camera::FrameSource] the detection pipeline reads
//!   from.
//! - [`sim`] – [`SimCamera`][sim::SimCamera]: a synthetic camera for headless
//!   runs and tests.

pub mod camera;
pub mod sim;

pub use camera::{Camera, CameraFeed, FrameSource};
pub use sim::SimCamera;
