//! [`ProviderPool`] – round-robin dispatcher with adaptive sizing.
//!
//! The pool spreads [`get_features`][ProviderPool::get_features] calls over
//! its providers in turn and times each call.  Every `K` calls the
//! [`HillClimber`] compares the mean latency with the previous window and
//! grows or shrinks the pool by one provider.  The pool never drops below one
//! provider.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use niftybot_hal::{CameraFeed, SimCamera};
//! use niftybot_perception::centroid::centroid;
//! use niftybot_perception::classifier::ClassifierFactory;
//! use niftybot_perception::config::PoolConfig;
//! use niftybot_perception::pool::ProviderPool;
//! # fn factory() -> Arc<dyn ClassifierFactory> { unimplemented!() }
//!
//! let source = Arc::new(CameraFeed::new(Box::new(SimCamera::new("front", 320, 240))));
//! let mut pool = ProviderPool::new(source, factory(), PoolConfig::default()).unwrap();
//! pool.start("upper_body".parse().unwrap(), 2).unwrap();
//! for _ in 0..100 {
//!     let features = pool.get_features();
//!     let (x, y) = centroid(&features);
//!     println!("crowd centre at ({x}, {y})");
//! }
//! pool.end();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use niftybot_hal::FrameSource;
use niftybot_types::{FeatureSet, TargetFeature, VisionError, empty_features};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::classifier::ClassifierFactory;
use crate::config::PoolConfig;
use crate::controller::{Direction, HillClimber};
use crate::provider::{Provider, ProviderSettings};
use crate::worker::WorkerCensus;

/// Snapshot of pool state for dashboards and logs.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub providers: usize,
    pub live_workers: usize,
    pub average_latency_ms: f64,
    pub last_window_mean_ms: Option<f64>,
    pub direction: Direction,
    pub target_feature: TargetFeature,
}

/// Mean of every latency sample seen since the pool started.
#[derive(Debug, Clone, Copy, Default)]
struct RunningAverage {
    total: Duration,
    samples: u64,
}

impl RunningAverage {
    fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.samples += 1;
    }

    fn mean(&self) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total.as_secs_f64() / self.samples as f64)
    }
}

/// Adaptive pool of [`Provider`]s sharing one frame source and label.
pub struct ProviderPool {
    source: Arc<dyn FrameSource>,
    factory: Arc<dyn ClassifierFactory>,
    config: PoolConfig,
    settings: ProviderSettings,
    feature: TargetFeature,
    providers: Vec<Provider>,
    cursor: usize,
    climber: HillClimber,
    average: RunningAverage,
    census: WorkerCensus,
    next_id: usize,
}

impl ProviderPool {
    /// Build an idle pool.  Nothing is spawned until [`start`][Self::start].
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        source: Arc<dyn FrameSource>,
        factory: Arc<dyn ClassifierFactory>,
        config: PoolConfig,
    ) -> Result<Self, VisionError> {
        config.validate()?;
        Ok(Self {
            source,
            factory,
            settings: ProviderSettings::from(&config),
            feature: config.target_feature.clone(),
            climber: HillClimber::new(config.latency_window),
            config,
            providers: Vec::new(),
            cursor: 0,
            average: RunningAverage::default(),
            census: WorkerCensus::new(),
            next_id: 0,
        })
    }

    /// Start `initial_count` providers looking for `feature`, take one
    /// warm-up reading to seed the average latency, and reset the controller
    /// window and the round-robin cursor.
    ///
    /// # Errors
    ///
    /// - [`VisionError::AlreadyStarted`] if the pool is running.
    /// - [`VisionError::InvalidConfig`] if `initial_count` is 0 or above the
    ///   configured `max_providers`.
    /// - Any error from starting a provider; providers already started are
    ///   ended again.
    pub fn start(&mut self, feature: TargetFeature, initial_count: usize) -> Result<(), VisionError> {
        if !self.providers.is_empty() {
            return Err(VisionError::AlreadyStarted);
        }
        if initial_count == 0 {
            return Err(VisionError::InvalidConfig(
                "a pool needs at least one provider".to_string(),
            ));
        }
        if let Some(max) = self.config.max_providers
            && initial_count > max
        {
            return Err(VisionError::InvalidConfig(format!(
                "cannot start {initial_count} providers with max_providers = {max}"
            )));
        }
        self.feature = feature;
        for _ in 0..initial_count {
            if let Err(e) = self.spawn_provider() {
                self.end();
                return Err(e);
            }
        }

        self.average = RunningAverage::default();
        let warm_up = Instant::now();
        self.providers[0].get_features();
        self.average.record(warm_up.elapsed());

        self.climber.reset();
        self.cursor = 0;
        info!(providers = initial_count, feature = %self.feature, "provider pool started");
        Ok(())
    }

    /// [`start`][Self::start] with the label and size from the pool's
    /// configuration.
    pub fn start_configured(&mut self) -> Result<(), VisionError> {
        let feature = self.config.target_feature.clone();
        self.start(feature, self.config.initial_providers)
    }

    /// Return the next provider's latest detections.
    ///
    /// Never waits on a classifier.  Every `K` calls this also runs one
    /// controller step, which may add or remove a provider.
    pub fn get_features(&mut self) -> FeatureSet {
        if self.providers.is_empty() {
            return empty_features();
        }
        self.cursor = (self.cursor + 1) % self.providers.len();

        // Respawn cost stays out of the latency sample.
        if self.config.respawn_dead_workers && !self.providers[self.cursor].is_alive() {
            let provider = &mut self.providers[self.cursor];
            warn!(provider = provider.id(), "detection worker died; respawning");
            if let Err(e) = provider.restart() {
                error!(provider = provider.id(), error = %e, "failed to respawn detection worker");
            }
        }

        let started = Instant::now();
        let features = self.providers[self.cursor].get_features();
        self.observe_latency(started.elapsed());
        features
    }

    /// Feed one latency sample to the running average and the controller,
    /// acting on any decision it makes.
    pub(crate) fn observe_latency(&mut self, latency: Duration) {
        self.average.record(latency);
        let Some(direction) = self.climber.record(latency) else {
            return;
        };
        debug!(
            direction = %direction,
            window_mean_us = self.climber.previous().map(|d| d.as_micros() as u64),
            providers = self.providers.len(),
            "controller step"
        );
        match direction {
            Direction::Grow => {
                if let Err(e) = self.add_provider() {
                    error!(error = %e, "controller could not add a provider");
                }
            }
            Direction::Shrink => {
                self.remove_provider(None);
            }
        }
    }

    /// Look for `feature` in every frame dispatched from now on.
    pub fn change_target_feature(&mut self, feature: TargetFeature) {
        info!(from = %self.feature, to = %feature, "target feature changed");
        for provider in &mut self.providers {
            provider.set_target_feature(feature.clone());
        }
        self.feature = feature;
    }

    /// Start one more provider with the current label and append it.
    ///
    /// Returns `Ok(false)` without doing anything when the pool is already at
    /// its configured `max_providers`.
    ///
    /// # Errors
    ///
    /// Any error from starting the provider.
    pub fn add_provider(&mut self) -> Result<bool, VisionError> {
        if let Some(max) = self.config.max_providers
            && self.providers.len() >= max
        {
            debug!(max, "pool at its ceiling; not adding a provider");
            return Ok(false);
        }
        self.spawn_provider()?;
        info!(providers = self.providers.len(), "provider added");
        Ok(true)
    }

    fn spawn_provider(&mut self) -> Result<(), VisionError> {
        let mut provider = Provider::new(
            self.next_id,
            Arc::clone(&self.source),
            Arc::clone(&self.factory),
            self.settings.clone(),
            self.census.clone(),
        );
        self.next_id += 1;
        provider.start(self.feature.clone())?;
        self.providers.push(provider);
        Ok(())
    }

    /// End and remove the provider at `index` (the last one when `None`).
    ///
    /// Refused, returning `false`, when it would leave the pool with no
    /// providers or when `index` is out of range.
    pub fn remove_provider(&mut self, index: Option<usize>) -> bool {
        if self.providers.len() <= 1 {
            debug!("pool at its floor; not removing a provider");
            return false;
        }
        let index = index.unwrap_or(self.providers.len() - 1);
        if index >= self.providers.len() {
            return false;
        }
        let mut provider = self.providers.remove(index);
        provider.end();
        self.cursor %= self.providers.len();
        info!(provider = provider.id(), providers = self.providers.len(), "provider removed");
        true
    }

    /// End every provider.  Safe to call repeatedly; the pool can be started
    /// again afterwards.
    pub fn end(&mut self) {
        if self.providers.is_empty() {
            return;
        }
        for provider in &mut self.providers {
            provider.end();
        }
        self.providers.clear();
        self.cursor = 0;
        info!("provider pool ended");
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider(&self, index: usize) -> Option<&Provider> {
        self.providers.get(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn target_feature(&self) -> &TargetFeature {
        &self.feature
    }

    pub fn direction(&self) -> Direction {
        self.climber.direction()
    }

    /// Worker threads still running, including ones from providers that have
    /// been ended but have not finished their last pass yet.
    pub fn live_workers(&self) -> usize {
        self.census.live()
    }

    /// Indices of providers whose worker has stopped on its own.
    pub fn dead_providers(&self) -> Vec<usize> {
        self.providers
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_alive())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn average_latency(&self) -> Duration {
        self.average.mean()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            providers: self.providers.len(),
            live_workers: self.live_workers(),
            average_latency_ms: self.average.mean().as_secs_f64() * 1000.0,
            last_window_mean_ms: self.climber.previous().map(|d| d.as_secs_f64() * 1000.0),
            direction: self.climber.direction(),
            target_feature: self.feature.clone(),
        }
    }
}

impl Drop for ProviderPool {
    fn drop(&mut self) {
        self.end();
    }
}
