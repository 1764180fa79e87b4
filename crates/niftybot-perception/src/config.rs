//! Pool configuration – read from a TOML file with `NIFTYBOT_*` environment
//! overrides.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! target_feature = "upper_body"
//! initial_providers = 2
//! quality = 0.5
//! latency_window = 10
//! frame_wait_ms = 2000
//! result_capacity = 2
//! # stale_after_ms = 1000
//! # max_providers = 8
//! respawn_dead_workers = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use niftybot_types::{TargetFeature, VisionError};
use serde::{Deserialize, Serialize};

/// Tunables of a [`ProviderPool`][crate::pool::ProviderPool].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Feature every provider looks for.
    #[serde(default)]
    pub target_feature: TargetFeature,

    /// Providers created when the pool starts.
    #[serde(default = "default_initial_providers")]
    pub initial_providers: usize,

    /// Scale at which the classifier analyses frames, `0 < quality <= 1`.
    #[serde(default = "default_quality")]
    pub quality: f32,

    /// Latency samples per controller decision (`K`).
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,

    /// How long a worker waits for a frame before checking for shutdown.
    #[serde(default = "default_frame_wait_ms")]
    pub frame_wait_ms: u64,

    /// Detection results a worker may queue before the oldest is dropped.
    #[serde(default = "default_result_capacity")]
    pub result_capacity: usize,

    /// Forget a provider's cached result once it is this old.  Unset keeps
    /// the last result forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_ms: Option<u64>,

    /// Upper bound on the pool size.  Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_providers: Option<usize>,

    /// Restart a provider whose worker has died when its turn comes round.
    #[serde(default)]
    pub respawn_dead_workers: bool,
}

fn default_initial_providers() -> usize {
    2
}
fn default_quality() -> f32 {
    0.5
}
fn default_latency_window() -> usize {
    10
}
fn default_frame_wait_ms() -> u64 {
    2000
}
fn default_result_capacity() -> usize {
    2
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_feature: TargetFeature::default(),
            initial_providers: default_initial_providers(),
            quality: default_quality(),
            latency_window: default_latency_window(),
            frame_wait_ms: default_frame_wait_ms(),
            result_capacity: default_result_capacity(),
            stale_after_ms: None,
            max_providers: None,
            respawn_dead_workers: false,
        }
    }
}

impl PoolConfig {
    /// Check that the values describe a runnable pool.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), VisionError> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(VisionError::InvalidConfig(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        if self.initial_providers == 0 {
            return Err(VisionError::InvalidConfig(
                "initial_providers must be at least 1".to_string(),
            ));
        }
        if self.latency_window == 0 {
            return Err(VisionError::InvalidConfig(
                "latency_window must be at least 1".to_string(),
            ));
        }
        if self.result_capacity == 0 {
            return Err(VisionError::InvalidConfig(
                "result_capacity must be at least 1".to_string(),
            ));
        }
        if let Some(max) = self.max_providers
            && max < self.initial_providers
        {
            return Err(VisionError::InvalidConfig(format!(
                "max_providers ({max}) is below initial_providers ({})",
                self.initial_providers
            )));
        }
        Ok(())
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

/// Return the path to `~/.niftybot/pool.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".niftybot").join("pool.toml")
}

/// Load the config from `path`, apply environment overrides, and validate
/// it.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<PoolConfig>, VisionError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        VisionError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: PoolConfig = toml::from_str(&raw).map_err(|e| {
        VisionError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
    })?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `NIFTYBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `NIFTYBOT_TARGET_FEATURE` | `target_feature` |
/// | `NIFTYBOT_INITIAL_PROVIDERS` | `initial_providers` |
/// | `NIFTYBOT_QUALITY` | `quality` |
/// | `NIFTYBOT_LATENCY_WINDOW` | `latency_window` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut PoolConfig) {
    if let Ok(v) = std::env::var("NIFTYBOT_TARGET_FEATURE")
        && let Ok(feature) = v.parse::<TargetFeature>()
    {
        cfg.target_feature = feature;
    }
    if let Ok(v) = std::env::var("NIFTYBOT_INITIAL_PROVIDERS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.initial_providers = n;
    }
    if let Ok(v) = std::env::var("NIFTYBOT_QUALITY")
        && let Ok(q) = v.parse::<f32>()
    {
        cfg.quality = q;
    }
    if let Ok(v) = std::env::var("NIFTYBOT_LATENCY_WINDOW")
        && let Ok(k) = v.parse::<usize>()
    {
        cfg.latency_window = k;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PoolConfig::default();
        cfg.validate().expect("defaults must validate");
        assert_eq!(cfg.target_feature.as_str(), "upper_body");
        assert_eq!(cfg.frame_wait(), Duration::from_secs(2));
        assert_eq!(cfg.stale_after(), None);
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        for quality in [0.0, -0.5, 1.5, f32::NAN] {
            let cfg = PoolConfig {
                quality,
                ..PoolConfig::default()
            };
            assert!(cfg.validate().is_err(), "quality {quality} must be rejected");
        }
        let full = PoolConfig {
            quality: 1.0,
            ..PoolConfig::default()
        };
        assert!(full.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let cfg = PoolConfig {
            initial_providers: 0,
            ..PoolConfig::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("initial_providers"));

        let cfg = PoolConfig {
            latency_window: 0,
            ..PoolConfig::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("latency_window"));

        let cfg = PoolConfig {
            result_capacity: 0,
            ..PoolConfig::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("result_capacity"));
    }

    #[test]
    fn ceiling_below_initial_size_is_rejected() {
        let cfg = PoolConfig {
            initial_providers: 3,
            max_providers: Some(2),
            ..PoolConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("pool.toml");
        fs::write(&path, "frame_wait_ms = 40\nstale_after_ms = 750\n").unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.frame_wait(), Duration::from_millis(40));
        assert_eq!(cfg.stale_after(), Some(Duration::from_millis(750)));
        assert_eq!(cfg.result_capacity, 2);
        assert!(!cfg.respawn_dead_workers);
    }

    #[test]
    fn unknown_feature_in_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("pool.toml");
        fs::write(&path, "target_feature = \"tail\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn invalid_values_in_file_fail_validation() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("pool.toml");
        fs::write(&path, "result_capacity = 0\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn serialized_defaults_round_trip() {
        let raw = toml::to_string_pretty(&PoolConfig::default()).unwrap();
        let back: PoolConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back, PoolConfig::default());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_niftybot_dir() {
        let p = config_path_for_home("/home/robot");
        assert!(p.to_string_lossy().contains(".niftybot"));
        assert!(p.to_string_lossy().ends_with("pool.toml"));
    }

    #[test]
    fn apply_env_overrides_changes_target_feature() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("NIFTYBOT_TARGET_FEATURE", "profile") };
        let mut cfg = PoolConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.target_feature.as_str(), "profile");
        unsafe { std::env::remove_var("NIFTYBOT_TARGET_FEATURE") };
    }

    #[test]
    fn apply_env_overrides_changes_latency_window() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("NIFTYBOT_LATENCY_WINDOW", "25") };
        let mut cfg = PoolConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.latency_window, 25);
        unsafe { std::env::remove_var("NIFTYBOT_LATENCY_WINDOW") };
    }

    #[test]
    fn apply_env_overrides_ignores_unparseable_values() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("NIFTYBOT_INITIAL_PROVIDERS", "lots") };
        let mut cfg = PoolConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.initial_providers, 2);
        unsafe { std::env::remove_var("NIFTYBOT_INITIAL_PROVIDERS") };
    }
}
