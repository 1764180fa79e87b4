//! The opaque detector boundary.
//!
//! A [`Classifier`] is slow, blocking, and stateful.  Each detection worker
//! owns exactly one instance, built for it by a [`ClassifierFactory`], and is
//! the only thread that ever calls it.

use niftybot_types::{DetectorHandle, Frame, TargetFeature};
use thiserror::Error;

/// A region reported by a classifier, in the coordinate space of the
/// *scaled* image the classifier actually looked at.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegion {
    pub center_x: f32,
    pub center_y: f32,
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub handle: Option<DetectorHandle>,
}

/// Failure raised by a classifier.  Fatal to the worker that observed it.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model for {feature:?} could not be loaded: {details}")]
    ModelUnavailable { feature: String, details: String },

    #[error("frame rejected by classifier: {0}")]
    UnsupportedFrame(String),

    #[error("classifier failed: {0}")]
    Failed(String),
}

/// A feature detector.
pub trait Classifier: Send {
    /// Look for `feature` in `frame`, analysing it at `quality` scale
    /// (`0 < quality <= 1`; lower is faster and less accurate).
    ///
    /// Returned coordinates are relative to the frame scaled by `quality`.
    ///
    /// # Errors
    ///
    /// Any error ends the calling worker; the pipeline never retries.
    fn detect(
        &mut self,
        frame: &Frame,
        feature: &TargetFeature,
        quality: f32,
    ) -> Result<Vec<RawRegion>, ClassifierError>;
}

/// Builds a fresh [`Classifier`] for the provider with the given id.
///
/// Implemented for any `Fn(usize) -> Box<dyn Classifier>` closure.
pub trait ClassifierFactory: Send + Sync {
    fn build(&self, provider_id: usize) -> Box<dyn Classifier>;
}

impl<F> ClassifierFactory for F
where
    F: Fn(usize) -> Box<dyn Classifier> + Send + Sync,
{
    fn build(&self, provider_id: usize) -> Box<dyn Classifier> {
        self(provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use niftybot_types::ColorEncoding;

    struct Tagged(usize);

    impl Classifier for Tagged {
        fn detect(
            &mut self,
            _frame: &Frame,
            _feature: &TargetFeature,
            _quality: f32,
        ) -> Result<Vec<RawRegion>, ClassifierError> {
            Ok(vec![RawRegion {
                center_x: self.0 as f32,
                center_y: 0.0,
                top_left_x: 0.0,
                top_left_y: 0.0,
                width: 1.0,
                height: 1.0,
                handle: Some(DetectorHandle(self.0 as u64)),
            }])
        }
    }

    #[test]
    fn closures_act_as_factories() {
        let factory = |id: usize| -> Box<dyn Classifier> { Box::new(Tagged(id)) };
        let mut classifier = factory.build(7);
        let frame = Frame::new(vec![0u8; 1], 1, 1, ColorEncoding::Gray8).unwrap();
        let regions = classifier
            .detect(&frame, &TargetFeature::default(), 1.0)
            .unwrap();
        assert_eq!(regions[0].handle, Some(DetectorHandle(7)));
    }

    #[test]
    fn classifier_error_display() {
        let err = ClassifierError::ModelUnavailable {
            feature: "face".to_string(),
            details: "missing cascade".to_string(),
        };
        assert!(err.to_string().contains("face"));
    }
}
