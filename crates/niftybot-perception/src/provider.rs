//! [`Provider`] – non-blocking handle to one detection worker.
//!
//! A provider pairs one worker thread with its two mailboxes and a cache of
//! the last detection result.  [`Provider::get_features`] never waits for the
//! classifier: it picks up whatever the worker has finished, hands the worker
//! the newest camera frame, and returns the cached result straight away.  The
//! caller sees detections that are one pass old, but never stalls behind a
//! slow classifier.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use niftybot_hal::{CameraFeed, SimCamera};
//! use niftybot_perception::classifier::ClassifierFactory;
//! use niftybot_perception::provider::{Provider, ProviderSettings};
//! use niftybot_perception::worker::WorkerCensus;
//! # fn factory() -> Arc<dyn ClassifierFactory> { unimplemented!() }
//!
//! let source = Arc::new(CameraFeed::new(Box::new(SimCamera::new("front", 64, 48))));
//! let mut provider = Provider::new(0, source, factory(), ProviderSettings::default(), WorkerCensus::new());
//! provider.start("face".parse().unwrap()).unwrap();
//! let features = provider.get_features(); // empty until the first pass lands
//! provider.end();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use niftybot_hal::FrameSource;
use niftybot_types::{FeatureRecord, FeatureSet, Frame, TargetFeature, VisionError, empty_features};
use tracing::{debug, warn};

use crate::classifier::ClassifierFactory;
use crate::config::PoolConfig;
use crate::mailbox::Mailbox;
use crate::worker::{FrameJob, WorkerCensus, WorkerContext, spawn_worker};

/// Per-provider tunables, usually derived from a [`PoolConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub quality: f32,
    pub frame_wait: Duration,
    pub result_capacity: usize,
    pub stale_after: Option<Duration>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from(&PoolConfig::default())
    }
}

impl From<&PoolConfig> for ProviderSettings {
    fn from(cfg: &PoolConfig) -> Self {
        Self {
            quality: cfg.quality,
            frame_wait: cfg.frame_wait(),
            result_capacity: cfg.result_capacity,
            stale_after: cfg.stale_after(),
        }
    }
}

/// Main-side ends of a running worker.
struct WorkerLink {
    frames: Mailbox<FrameJob>,
    results: Receiver<Vec<FeatureRecord>>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl WorkerLink {
    /// Signal the worker to stop and let go of both mailboxes.  The thread is
    /// detached; whatever it is classifying is thrown away.
    fn sever(self) {
        self.stop.store(true, Ordering::Release);
        drop(self.frames);
        drop(self.results);
        drop(self.handle);
    }
}

/// Non-blocking handle to one detection worker.
pub struct Provider {
    id: usize,
    source: Arc<dyn FrameSource>,
    factory: Arc<dyn ClassifierFactory>,
    settings: ProviderSettings,
    census: WorkerCensus,
    feature: TargetFeature,
    link: Option<WorkerLink>,
    started: bool,
    features: FeatureSet,
    last_update: Option<Instant>,
    frame_size: Option<(u32, u32)>,
}

impl Provider {
    pub fn new(
        id: usize,
        source: Arc<dyn FrameSource>,
        factory: Arc<dyn ClassifierFactory>,
        settings: ProviderSettings,
        census: WorkerCensus,
    ) -> Self {
        Self {
            id,
            source,
            factory,
            settings,
            census,
            feature: TargetFeature::default(),
            link: None,
            started: false,
            features: empty_features(),
            last_update: None,
            frame_size: None,
        }
    }

    /// Capture a first frame and spawn the worker looking for `feature`.
    ///
    /// # Errors
    ///
    /// - [`VisionError::AlreadyStarted`] on a second call.
    /// - Any capture error from the frame source.
    /// - [`VisionError::Spawn`] if the worker thread cannot be created.
    pub fn start(&mut self, feature: TargetFeature) -> Result<(), VisionError> {
        if self.started {
            return Err(VisionError::AlreadyStarted);
        }
        self.feature = feature;
        self.launch()?;
        self.started = true;
        Ok(())
    }

    /// Replace a dead (or ended) worker with a fresh one.  The cached result
    /// is kept until the new worker reports.
    ///
    /// # Errors
    ///
    /// Same as [`start`][Self::start], except that restarting a provider
    /// that was never started is allowed and simply starts it.
    pub fn restart(&mut self) -> Result<(), VisionError> {
        if let Some(link) = self.link.take() {
            link.sever();
        }
        self.launch()?;
        self.started = true;
        Ok(())
    }

    fn launch(&mut self) -> Result<(), VisionError> {
        let frame = self.source.capture_frame()?;
        self.frame_size = Some(frame.size());

        let frames = Mailbox::new(1);
        let results = Mailbox::new(self.settings.result_capacity);
        let results_rx = results.receiver();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_frames = frames.receiver();
        frames.post(FrameJob {
            frame,
            feature: self.feature.clone(),
        });

        let handle = spawn_worker(
            WorkerContext {
                provider_id: self.id,
                classifier: self.factory.build(self.id),
                frames: worker_frames,
                results,
                stop: Arc::clone(&stop),
                quality: self.settings.quality,
                frame_wait: self.settings.frame_wait,
            },
            &self.census,
        )?;
        debug!(provider = self.id, feature = %self.feature, "provider started");

        self.link = Some(WorkerLink {
            frames,
            results: results_rx,
            stop,
            handle,
        });
        Ok(())
    }

    /// Return the latest known detections without waiting.
    ///
    /// Picks up the newest finished result (if any), queues the current
    /// camera frame for the worker (replacing any frame it has not started
    /// on), then returns the cache.  Empty until the first pass completes.
    pub fn get_features(&mut self) -> FeatureSet {
        if let Some(link) = &self.link {
            let mut fresh = None;
            while let Ok(result) = link.results.try_recv() {
                fresh = Some(result);
            }
            if let Some(result) = fresh {
                self.features = result.into();
                self.last_update = Some(Instant::now());
            }

            match self.source.capture_frame() {
                Ok(frame) => self.dispatch(frame),
                Err(e) => warn!(provider = self.id, error = %e, "frame capture failed; worker keeps its previous frame"),
            }
        }

        if let (Some(limit), Some(at)) = (self.settings.stale_after, self.last_update)
            && at.elapsed() > limit
            && !self.features.is_empty()
        {
            debug!(provider = self.id, "cached detections expired");
            self.features = empty_features();
        }

        Arc::clone(&self.features)
    }

    fn dispatch(&self, frame: Frame) {
        if let Some(link) = &self.link {
            link.frames.post(FrameJob {
                frame,
                feature: self.feature.clone(),
            });
        }
    }

    /// Look for `feature` in every frame dispatched from now on.  Passes
    /// already queued or running keep their old label.
    pub fn set_target_feature(&mut self, feature: TargetFeature) {
        self.feature = feature;
    }

    /// Stop the worker and close both mailboxes.  Safe to call repeatedly.
    pub fn end(&mut self) {
        if let Some(link) = self.link.take() {
            link.sever();
            debug!(provider = self.id, "provider ended");
        }
    }

    /// `true` while the worker thread is running.
    pub fn is_alive(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| !link.handle.is_finished())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn target_feature(&self) -> &TargetFeature {
        &self.feature
    }

    /// Dimensions of the frame captured when the worker was launched.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    /// When the cache was last refreshed by the worker.
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.end();
    }
}
