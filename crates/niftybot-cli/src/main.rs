//! `niftybot` – headless run of the perception pipeline.
//!
//! Starts a [`ProviderPool`] over a simulated camera and a synthetic
//! classifier, then asks it for features on a fixed tick.  Each tick logs the
//! detections and the crowd centroid; every so often the pool statistics are
//! logged as JSON.  The run ends after `--ticks` ticks or on Ctrl-C.

mod synthetic;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, error, info, warn};

use niftybot_hal::{CameraFeed, FrameSource, SimCamera};
use niftybot_perception::classifier::{Classifier, ClassifierFactory};
use niftybot_perception::config::{self, PoolConfig};
use niftybot_perception::{ProviderPool, centroid};
use niftybot_types::TargetFeature;

use crate::synthetic::SyntheticClassifier;

/// Adaptive feature detection on a simulated camera.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pool configuration file (default: ~/.niftybot/pool.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks; run until Ctrl-C when omitted
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Simulated cost of one full-quality classifier pass, in milliseconds
    #[arg(long, default_value_t = 120)]
    latency_ms: u64,

    /// People the synthetic classifier reports in every frame
    #[arg(long, default_value_t = 2)]
    people: usize,

    /// Override the configured target feature
    #[arg(short, long)]
    feature: Option<TargetFeature>,

    /// Simulated frame width in pixels
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Simulated frame height in pixels
    #[arg(long, default_value_t = 240)]
    height: u32,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _telemetry = telemetry::init_tracing("niftybot");

    print_banner();

    let mut cfg = load_config(args.config.as_deref());
    if let Some(feature) = args.feature.clone() {
        cfg.target_feature = feature;
    }

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping detection workers …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; only --ticks will end the run");
    }

    // ── Pipeline ──────────────────────────────────────────────────────────
    let source: Arc<dyn FrameSource> = Arc::new(CameraFeed::new(Box::new(SimCamera::new(
        "front",
        args.width,
        args.height,
    ))));
    let latency = Duration::from_millis(args.latency_ms);
    let people = args.people;
    let factory: Arc<dyn ClassifierFactory> = Arc::new(move |_id: usize| -> Box<dyn Classifier> {
        Box::new(SyntheticClassifier::new(latency, people))
    });

    let mut pool = match ProviderPool::new(source, factory, cfg) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "invalid pool configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = pool.start_configured() {
        error!(error = %e, "failed to start provider pool");
        return ExitCode::FAILURE;
    }
    println!(
        "  Looking for {} with {} provider(s).\n",
        pool.target_feature().as_str().bold(),
        pool.len()
    );

    let interval = Duration::from_millis(args.interval_ms);
    let mut tick: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) && args.ticks.is_none_or(|limit| tick < limit) {
        let features = pool.get_features();
        let (x, y) = centroid(&features);
        info!(
            tick,
            detections = features.len(),
            centroid_x = x,
            centroid_y = y,
            providers = pool.len(),
            "features"
        );

        if tick % 20 == 19 {
            match serde_json::to_string(&pool.stats()) {
                Ok(json) => info!(stats = %json, "pool stats"),
                Err(e) => debug!(error = %e, "could not serialize pool stats"),
            }
        }

        tick += 1;
        thread::sleep(interval);
    }

    let stats = pool.stats();
    pool.end();
    println!();
    println!(
        "  {} {} ticks, {} provider(s) at exit, mean latency {:.3} ms",
        "✓".green().bold(),
        tick,
        stats.providers,
        stats.average_latency_ms
    );
    ExitCode::SUCCESS
}

/// Read the pool configuration from `path` (or the default location).  A
/// missing file means defaults plus environment overrides; a broken file is
/// reported and replaced by defaults.
fn load_config(path: Option<&std::path::Path>) -> PoolConfig {
    let path = path.map(PathBuf::from).unwrap_or_else(config::config_path);
    match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = PoolConfig::default();
            config::apply_env_overrides(&mut cfg);
            if let Err(e) = cfg.validate() {
                println!("{}: {}", "Config error".red(), e);
                println!("  Using default configuration.");
                return PoolConfig::default();
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            PoolConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _  ___ ______     ___       __ "#.bold().cyan());
    println!("{}", r#"  / |/ (_) _/ /___ _/ _ )___  / /_"#.bold().cyan());
    println!("{}", r#" /    / / _/ __/ // / _  / _ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/|_/_/_/ \__/\_, /____/\___/\__/ "#.bold().cyan());
    println!("{}", r#"              /___/               "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "NiftyBot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Adaptive feature detection");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_have_sensible_defaults() {
        let args = Args::try_parse_from(["niftybot"]).unwrap();
        assert_eq!(args.ticks, None);
        assert_eq!(args.interval_ms, 50);
        assert_eq!(args.people, 2);
        assert!(args.feature.is_none());
    }

    #[test]
    fn feature_argument_is_validated() {
        let args = Args::try_parse_from(["niftybot", "--feature", "face", "--ticks", "5"]).unwrap();
        assert_eq!(args.feature.map(|f| f.to_string()), Some("face".to_string()));
        assert_eq!(args.ticks, Some(5));
        assert!(Args::try_parse_from(["niftybot", "--feature", "tail"]).is_err());
    }

    #[test]
    fn broken_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("pool.toml");
        std::fs::write(&path, "quality = \"high\"\n").unwrap();
        let cfg = load_config(Some(&path));
        assert_eq!(cfg.quality, PoolConfig::default().quality);
    }

    #[test]
    fn config_file_is_honoured() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("pool.toml");
        std::fs::write(&path, "result_capacity = 4\nmax_providers = 6\n").unwrap();
        let cfg = load_config(Some(&path));
        assert_eq!(cfg.result_capacity, 4);
        assert_eq!(cfg.max_providers, Some(6));
    }
}
