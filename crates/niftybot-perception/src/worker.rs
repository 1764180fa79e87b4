//! Detection worker – the only place classifier latency is paid.
//!
//! Each worker is a dedicated OS thread that owns one [`Classifier`].  It
//! waits (with a timeout, so it stays stoppable) for the newest
//! [`FrameJob`] in its single-slot inbound mailbox, runs the classifier,
//! maps the regions back to original-frame coordinates, and posts them to its
//! outbound mailbox.
//!
//! There is no retry: a classifier error or panic ends the thread and the
//! owning provider keeps serving its last cached result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use niftybot_types::{FeatureRecord, Frame, TargetFeature};
use tracing::{debug, error, trace};

use crate::classifier::{Classifier, RawRegion};
use crate::mailbox::Mailbox;

/// One unit of work: a frame plus the label that was current when it was
/// dispatched.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub frame: Frame,
    pub feature: TargetFeature,
}

/// Counts worker threads that have been spawned and not yet exited.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct WorkerCensus {
    live: Arc<AtomicUsize>,
}

impl WorkerCensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads still running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn enter(&self) -> CensusGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        CensusGuard {
            live: Arc::clone(&self.live),
        }
    }
}

/// Decrements the census when the worker thread ends, including by panic.
struct CensusGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for CensusGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything a worker thread needs; moved into the thread on spawn.
pub(crate) struct WorkerContext {
    pub(crate) provider_id: usize,
    pub(crate) classifier: Box<dyn Classifier>,
    pub(crate) frames: Receiver<FrameJob>,
    pub(crate) results: Mailbox<Vec<FeatureRecord>>,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) quality: f32,
    pub(crate) frame_wait: Duration,
}

/// Spawn the worker thread for `ctx`, registering it with `census`.
pub(crate) fn spawn_worker(
    ctx: WorkerContext,
    census: &WorkerCensus,
) -> std::io::Result<JoinHandle<()>> {
    let guard = census.enter();
    thread::Builder::new()
        .name(format!("detect-{}", ctx.provider_id))
        .spawn(move || {
            let _guard = guard;
            run(ctx);
        })
}

fn run(ctx: WorkerContext) {
    let WorkerContext {
        provider_id,
        mut classifier,
        frames,
        results,
        stop,
        quality,
        frame_wait,
    } = ctx;
    debug!(provider = provider_id, "detection worker started");

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let job = match frames.recv_timeout(frame_wait) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match classifier.detect(&job.frame, &job.feature, quality) {
            Ok(regions) => {
                // Results finished after shutdown are abandoned.
                if stop.load(Ordering::Acquire) {
                    break;
                }
                let records = rescale(&regions, quality);
                trace!(
                    provider = provider_id,
                    feature = %job.feature,
                    detections = records.len(),
                    "detection pass complete"
                );
                results.post(records);
            }
            Err(e) => {
                error!(
                    provider = provider_id,
                    feature = %job.feature,
                    error = %e,
                    "classifier failed; detection worker exiting"
                );
                break;
            }
        }
    }

    debug!(provider = provider_id, "detection worker stopped");
}

/// Map classifier regions from the `quality`-scaled image back to the
/// original frame's coordinate space.
pub fn rescale(regions: &[RawRegion], quality: f32) -> Vec<FeatureRecord> {
    let scale = 1.0 / quality;
    regions
        .iter()
        .map(|r| FeatureRecord {
            height: r.height * scale,
            width: r.width * scale,
            top_left_x: r.top_left_x * scale,
            top_left_y: r.top_left_y * scale,
            center_x: r.center_x * scale,
            center_y: r.center_y * scale,
            handle: r.handle,
        })
        .collect()
}
