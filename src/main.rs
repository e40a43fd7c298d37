use anyhow::{Context, Result, anyhow};
use clap::Parser;
use embassy_executor::{Executor, Spawner};
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::config::SimulationConfig;
use crate::common::scene::{Scene, load_scene};
use crate::simulation::report::RunReport;
use crate::simulation::types::{Position, ReportQueue, ReportQueueReceiver, ReportQueueSender};

mod common;
mod simulation;
mod time_driver;

#[derive(Parser, Debug)]
#[command(name = "geocast-cds-simulator")]
#[command(about = "Simulates Gabriel-Graph planarization and geocast CDS construction")]
struct Cli {
    /// Scene JSON file
    #[arg(long, conflicts_with = "random", required_unless_present = "random")]
    scene: Option<String>,

    /// Generate a random scene with this many nodes instead of loading one
    #[arg(long)]
    random: Option<usize>,

    /// Side length of the square area used by --random
    #[arg(long, default_value_t = 10.0)]
    area: f64,

    /// Override the configured seed (random scene and send jitter)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation config (defaults to config.toml next to the scene)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured run length
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Override the configured clock speed (100 = real time)
    #[arg(long)]
    speed_percent: Option<u32>,

    /// Trace-level logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let crate_level = if verbose { LevelFilter::Trace } else { LevelFilter::Debug };
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("geocast_cds_simulator"), crate_level)
        .parse_default_env()
        .init();
}

fn load_inputs(cli: &Cli) -> Result<(Scene, SimulationConfig)> {
    let config_path = cli.config.clone().or_else(|| cli.scene.as_deref().map(SimulationConfig::config_path_from_scene));
    let mut config = match config_path {
        Some(path) => SimulationConfig::load_or_default(&path)?,
        None => SimulationConfig::default(),
    };
    if let Some(duration_ms) = cli.duration_ms {
        config.duration_ms = duration_ms;
    }
    if let Some(speed_percent) = cli.speed_percent {
        config.speed_percent = speed_percent;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let scene = match (&cli.scene, cli.random) {
        (Some(path), _) => load_scene(path).with_context(|| format!("Failed to load scene {}", path))?,
        (None, Some(count)) => {
            let scene = Scene::random(count, Position::new(cli.area, cli.area, 0.0), None, config.seed);
            common::scene::validate_scene(&scene)
                .map_err(|e| anyhow!(e))
                .context("Invalid random scene")?;
            scene
        }
        (None, None) => return Err(anyhow!("Either --scene or --random is required")),
    };

    config
        .validate(scene.nodes.len())
        .map_err(|e| anyhow!(e))
        .context("Invalid simulation config")?;

    Ok((scene, config))
}

fn embassy_init(spawner: Spawner, scene: Scene, config: SimulationConfig, report_tx: ReportQueueSender) {
    let _ = spawner.spawn(simulation::network_task(spawner, scene, config, report_tx));
}

/// Host time a run of `duration_ms` simulated ms needs at `speed_percent`, plus slack.
fn host_budget(duration_ms: u64, speed_percent: u32) -> Duration {
    Duration::from_millis(duration_ms.saturating_mul(100) / speed_percent.max(1) as u64) + Duration::from_secs(10)
}

/// Poll for the run report, giving up once `budget` of host time has passed.
fn wait_for_report(report_rx: ReportQueueReceiver, budget: Duration) -> Result<RunReport> {
    let deadline = Instant::now() + budget;
    loop {
        if let Ok(report) = report_rx.try_receive() {
            return Ok(report);
        }
        if Instant::now() > deadline {
            return Err(anyhow!("No report after {:?}, simulation stalled", budget));
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting up");
    let (scene, config) = load_inputs(&cli)?;
    time_driver::set_simulation_speed_percent(config.speed_percent);
    let speed_percent = time_driver::get_simulation_speed_percent();
    info!(
        "Running {} nodes for {} ms at {}% speed, seed {}",
        scene.nodes.len(),
        config.duration_ms,
        speed_percent,
        config.seed
    );

    let budget = host_budget(config.duration_ms, speed_percent);

    let report_channel: &'static ReportQueue = Box::leak(Box::new(ReportQueue::new()));
    let report_tx = report_channel.sender();
    let report_rx = report_channel.receiver();

    // Spawn Embassy executor on a dedicated background thread
    thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .name("embassy-executor".to_string())
        .spawn(move || {
            // Leak the executor to satisfy the 'static lifetime required by run()
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(|spawner| embassy_init(spawner, scene, config, report_tx));
        })
        .context("Failed to spawn embassy thread")?;

    let report = wait_for_report(report_rx, budget)?;
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize run report")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_budget_scales_with_speed_and_saturates() {
        assert_eq!(host_budget(30_000, 1000), Duration::from_secs(13));
        assert_eq!(host_budget(1000, 100), Duration::from_secs(11));
        let huge = host_budget(u64::MAX, 1);
        assert_eq!(huge, Duration::from_millis(u64::MAX) + Duration::from_secs(10));
    }
}
