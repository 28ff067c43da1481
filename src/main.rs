//! DhruvaDock - mission controller for VacuumTiger
//!
//! Runs the control loop against the built-in bench simulator:
//!
//! - **Control Thread** (~5Hz): Drains sensor channels, runs the behavior and
//!   docking state machines, publishes velocity commands
//! - **Simulator Thread** (~50Hz): Integrates the robot, publishes pose,
//!   marker detections, obstacle signal and bumper presses
//!
//! Usage:
//!   dhruva-dock                      # dhruva-dock.toml or defaults
//!   dhruva-dock mission.toml --target 1 --max-secs 120
//!   RUST_LOG=dhruva_dock=debug dhruva-dock --target 21

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use dhruva_dock::config::DockConfig;
use dhruva_dock::error::{DockError, Result};
use dhruva_dock::shared::SharedState;
use dhruva_dock::threads::spawn_threads;
use dhruva_dock::types::StationId;

const DEFAULT_CONFIG: &str = "dhruva-dock.toml";

/// Station-to-station docking mission on the bench simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (default: dhruva-dock.toml if present)
    config: Option<PathBuf>,

    /// Station to visit before returning home
    #[arg(short, long)]
    target: Option<u32>,

    /// Home station id
    #[arg(long)]
    home: Option<u32>,

    /// Simulator random seed (0 = entropy)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation speed factor (1.0 = realtime)
    #[arg(long)]
    speed: Option<f32>,

    /// Stop after this many seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_secs: u64,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "dhruva_dock=info"
                    .parse()
                    .map_err(|e| DockError::Config(format!("Bad log directive: {}", e)))?,
            ),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("DhruvaDock v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Home station {}, target {}, {} stations, control {:.0}Hz",
        config.mission.home,
        config
            .mission
            .target
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string()),
        config.stations.len(),
        config.control.rate_hz
    );

    let shared_state = Arc::new(SharedState::new());
    setup_signal_handler(Arc::clone(&shared_state))?;

    info!("Starting control and simulator threads...");
    let handles = spawn_threads(config, Arc::clone(&shared_state))?;

    // Main thread: Monitor and wait for completion
    let check_interval = Duration::from_millis(200);
    let budget = (args.max_secs > 0).then(|| Duration::from_secs(args.max_secs));
    let started = Instant::now();

    loop {
        std::thread::sleep(check_interval);

        if shared_state.should_shutdown() {
            info!("Shutdown requested");
            break;
        }

        if shared_state.is_mission_complete() {
            info!("Mission completed successfully");
            break;
        }

        if let Some(budget) = budget
            && started.elapsed() >= budget
        {
            warn!("Time budget of {}s exhausted", budget.as_secs());
            break;
        }

        if handles.control.is_finished() || handles.sim.is_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }

    // Signal shutdown to all threads
    shared_state.signal_shutdown();

    info!("Waiting for threads to finish...");
    if let Err(e) = handles.control.join() {
        error!("Control thread panicked: {:?}", e);
    }
    if let Err(e) = handles.sim.join() {
        error!("Simulator thread panicked: {:?}", e);
    }

    info!(
        "DhruvaDock finished after {:.1}s ({} control ticks)",
        started.elapsed().as_secs_f32(),
        shared_state.tick_count()
    );
    Ok(())
}

/// Config file, then CLI overrides, then validation.
fn load_config(args: &Args) -> Result<DockConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DockConfig::load(path)?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG);
            DockConfig::load(Path::new(DEFAULT_CONFIG))?
        }
        None => {
            info!("Using default configuration");
            DockConfig::default()
        }
    };

    if let Some(target) = args.target {
        config.mission.target = Some(StationId(target));
    }
    if let Some(home) = args.home {
        config.mission.home = StationId(home);
    }
    if let Some(seed) = args.seed {
        config.sim.random_seed = seed;
    }
    if let Some(speed) = args.speed {
        config.sim.speed_factor = speed;
    }

    config.validate()?;
    Ok(config)
}

fn setup_signal_handler(shared_state: Arc<SharedState>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {:?}, initiating shutdown...", sig);
                shared_state.signal_shutdown();
            }
        })?;
    Ok(())
}
