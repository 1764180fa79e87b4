//! `niftybot-perception` – adaptive visual feature detection.
//!
//! Turns a stream of camera frames into "where are the people?" answers
//! without ever making the caller wait for a slow classifier.
//!
//! # Modules
//!
//! - [`classifier`] – the [`Classifier`][classifier::Classifier] trait every
//!   detector implements, and the factory that builds one per worker.
//! - [`mailbox`] – [`Mailbox`][mailbox::Mailbox]: bounded queue that evicts
//!   the oldest message instead of blocking.
//! - [`worker`] – the detection worker thread and the
//!   [`WorkerCensus`][worker::WorkerCensus] that counts live ones.
//! - [`provider`] – [`Provider`][provider::Provider]: non-blocking handle to
//!   one worker with a cache of its last result.
//! - [`controller`] – [`HillClimber`][controller::HillClimber]: bang-bang
//!   controller that steers the pool size by observed latency.
//! - [`pool`] – [`ProviderPool`][pool::ProviderPool]: round-robin dispatcher
//!   over providers, resized by the controller.
//! - [`centroid`] – mean centre of a set of detections.
//! - [`config`] – [`PoolConfig`][config::PoolConfig] loaded from TOML with
//!   environment overrides.

pub mod centroid;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod mailbox;
pub mod pool;
pub mod provider;
pub mod worker;

pub use centroid::centroid;
pub use classifier::{Classifier, ClassifierError, ClassifierFactory, RawRegion};
pub use config::PoolConfig;
pub use controller::{Direction, HillClimber};
pub use pool::{PoolStats, ProviderPool};
pub use provider::{Provider, ProviderSettings};
pub use worker::WorkerCensus;
