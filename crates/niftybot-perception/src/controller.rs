//! [`HillClimber`] – bang-bang pool-size controller.
//!
//! # Algorithm
//!
//! Latency samples are collected into a rolling window of `K` entries.  Every
//! `K` samples the controller compares the window mean (`recent`) with the
//! mean of the previous window (`previous`):
//!
//! - first window: nothing to compare against, the mean only becomes the
//!   baseline;
//! - `recent < previous`: the last move helped, so move again in the same
//!   [`Direction`];
//! - `recent >= previous`: the last move hurt, so flip the direction and move
//!   once in the new one.
//!
//! The window is then cleared and `recent` becomes the new baseline.  The
//! controller has no notion of a stable optimum: around the best pool size it
//! keeps oscillating by one provider.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use niftybot_perception::controller::{Direction, HillClimber};
//!
//! let mut climber = HillClimber::new(2);
//! let ms = Duration::from_millis;
//!
//! // Baseline window: no decision yet.
//! assert_eq!(climber.record(ms(40)), None);
//! assert_eq!(climber.record(ms(40)), None);
//!
//! // Faster than before: keep growing.
//! assert_eq!(climber.record(ms(30)), None);
//! assert_eq!(climber.record(ms(30)), Some(Direction::Grow));
//!
//! // Slower than before: reverse.
//! assert_eq!(climber.record(ms(50)), None);
//! assert_eq!(climber.record(ms(50)), Some(Direction::Shrink));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Which way the controller is currently steering the pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Add a provider on the next move.
    Grow,
    /// Remove a provider on the next move.
    Shrink,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Grow => Direction::Shrink,
            Direction::Shrink => Direction::Grow,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Grow => f.write_str("grow"),
            Direction::Shrink => f.write_str("shrink"),
        }
    }
}

/// Two-state hill-climbing controller over a rolling latency window.
#[derive(Debug, Clone)]
pub struct HillClimber {
    window_size: usize,
    window: VecDeque<Duration>,
    calls_since_step: usize,
    previous: Option<Duration>,
    direction: Direction,
}

impl HillClimber {
    /// Create a controller that decides once every `window_size` samples
    /// (minimum 1).  The initial direction is [`Direction::Grow`].
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            calls_since_step: 0,
            previous: None,
            direction: Direction::Grow,
        }
    }

    /// Record one latency sample.
    ///
    /// Returns `Some(direction)` when this sample completes a window and the
    /// controller decides the pool should move one step that way.
    pub fn record(&mut self, latency: Duration) -> Option<Direction> {
        self.window.push_back(latency);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.calls_since_step += 1;
        if self.calls_since_step < self.window_size {
            return None;
        }
        self.calls_since_step = 0;
        self.step()
    }

    fn step(&mut self) -> Option<Direction> {
        let recent = self.window_mean()?;
        let decision = match self.previous {
            None => None,
            Some(previous) if recent < previous => Some(self.direction),
            Some(_) => {
                self.direction = self.direction.flipped();
                Some(self.direction)
            }
        };
        self.window.clear();
        self.previous = Some(recent);
        decision
    }

    /// Mean of the samples currently in the window.
    pub fn window_mean(&self) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let total: Duration = self.window.iter().sum();
        Some(total / self.window.len() as u32)
    }

    /// Forget all samples and the baseline; the direction is kept.
    pub fn reset(&mut self) {
        self.window.clear();
        self.calls_since_step = 0;
        self.previous = None;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Mean of the last completed window, if any.
    pub fn previous(&self) -> Option<Duration> {
        self.previous
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn samples(&self) -> usize {
        self.window.len()
    }
}
