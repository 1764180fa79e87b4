//! Stand-in classifier for running the pipeline without a real detector.
//!
//! [`SyntheticClassifier`] sleeps for a configurable time to mimic the cost
//! of a cascade pass, then reports a fixed number of "people" walking slowly
//! across the frame.  Their position is derived from the first byte of the
//! frame, which the simulated camera fills with a frame counter, so
//! consecutive frames show movement.

use std::thread;
use std::time::Duration;

use niftybot_perception::classifier::{Classifier, ClassifierError, RawRegion};
use niftybot_types::{Frame, TargetFeature};

pub struct SyntheticClassifier {
    latency: Duration,
    people: usize,
}

impl SyntheticClassifier {
    pub fn new(latency: Duration, people: usize) -> Self {
        Self { latency, people }
    }
}

impl Classifier for SyntheticClassifier {
    fn detect(
        &mut self,
        frame: &Frame,
        feature: &TargetFeature,
        quality: f32,
    ) -> Result<Vec<RawRegion>, ClassifierError> {
        if frame.data().is_empty() {
            return Err(ClassifierError::UnsupportedFrame("empty frame".to_string()));
        }
        // Work scales with the number of pixels examined.
        thread::sleep(self.latency.mul_f32(quality * quality));

        let width = frame.width() as f32 * quality;
        let height = frame.height() as f32 * quality;
        let phase = f32::from(frame.data()[0]) / 255.0;

        // Faces are small, bodies are tall.
        let (box_w, box_h) = match feature.as_str() {
            "fullbody" | "lower_body" => (width * 0.12, height * 0.6),
            "upper_body" | "upper_body2" => (width * 0.15, height * 0.35),
            _ => (width * 0.08, height * 0.1),
        };

        let lanes = self.people as f32 + 1.0;
        let regions = (0..self.people)
            .map(|i| {
                let lane = (i as f32 + 1.0) / lanes;
                let center_x = ((lane + phase * 0.1) % 1.0) * width;
                let center_y = height * 0.5;
                RawRegion {
                    center_x,
                    center_y,
                    top_left_x: center_x - box_w / 2.0,
                    top_left_y: center_y - box_h / 2.0,
                    width: box_w,
                    height: box_h,
                    handle: None,
                }
            })
            .collect();
        Ok(regions)
    }
}
