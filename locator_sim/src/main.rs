//! Locator Simulator CLI
//!
//! Runs deterministic scenarios against the session, or drives the real-time
//! engine from the helix simulator (`--live`) or from standard input
//! (`--stdin`).

use clap::Parser;
use locator_core::{
    lock_session, EngineConfig, EngineHandle, ExportError, FrameSink, LocatorEngine, SessionConfig, SessionStats, TracingSink,
    Viewport,
};
use locator_env::{ChannelTransport, TokioContext};
use locator_sim::scenarios::ScenarioId;
use locator_sim::{FaultConfig, HelixProducer, ScenarioResult, ScenarioRunner, SimError, SimFeed, SAMPLE_INTERVAL};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Locator simulation and replay CLI
#[derive(Parser, Debug)]
#[command(name = "locator-sim")]
#[command(about = "Run deterministic trajectory scenarios or drive the live engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (helix, wraparound, malformed, dropout, clear_midstream, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated (or, with --live, wall-clock) duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Trail ring capacity
    #[arg(long)]
    max_points: Option<usize>,

    /// History cap for hover lookup and export
    #[arg(long)]
    max_saved_points: Option<usize>,

    /// Nominal scene size
    #[arg(long)]
    box_size: Option<f64>,

    /// Raw-to-scene multiplier
    #[arg(long)]
    visual_scale: Option<f64>,

    /// JSON session config; flags above override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the history CSV into this directory
    #[arg(long)]
    export: Option<PathBuf>,

    /// Run the real-time engine fed by the helix simulator
    #[arg(long, conflicts_with = "stdin")]
    live: bool,

    /// Run the real-time engine fed by text/JSON lines on standard input
    #[arg(long)]
    stdin: bool,

    /// Record rendered frames to a Rerun .rrd file (live and stdin modes)
    #[cfg(feature = "visualization")]
    #[arg(long)]
    rrd: Option<String>,

    /// Stream rendered frames to a spawned Rerun viewer (live and stdin modes)
    #[cfg(feature = "visualization")]
    #[arg(long, conflicts_with = "rrd")]
    viewer: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn init_logging(args: &Args) {
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Base config from `--config` (or defaults) with flag overrides applied.
fn session_config(args: &Args) -> Result<SessionConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(v) = args.max_points {
        config.max_points = v;
    }
    if let Some(v) = args.max_saved_points {
        config.max_saved_points = v;
    }
    if let Some(v) = args.box_size {
        config.box_size = v;
    }
    if let Some(v) = args.visual_scale {
        config.visual_scale = v;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "visualization")]
fn frame_sink(args: &Args, box_size: f64) -> Result<Box<dyn FrameSink>, SimError> {
    match &args.rrd {
        Some(path) => Ok(Box::new(locator_core::RerunSink::to_file("locator", path, box_size)?)),
        None if args.viewer => Ok(Box::new(locator_core::RerunSink::spawn("locator", box_size)?)),
        None => Ok(Box::new(TracingSink)),
    }
}

#[cfg(not(feature = "visualization"))]
fn frame_sink(_args: &Args, _box_size: f64) -> Result<Box<dyn FrameSink>, SimError> {
    Ok(Box::new(TracingSink))
}

/// Waits until the engine has ingested `expected` messages, or gives up.
async fn wait_for_drain(handle: &EngineHandle, expected: u64) {
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let stats = handle.stats();
            if stats.accepted + stats.rejected >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(expected, "engine did not drain the feed in time");
    }
}

/// Exports (if asked) and shuts the engine down.
///
/// Export runs before shutdown, while the buffers still exist.
async fn finish(handle: EngineHandle, export: Option<&PathBuf>) -> Result<SessionStats, SimError> {
    if let Some(dir) = export {
        std::fs::create_dir_all(dir)?;
        match handle.export_to_dir(dir) {
            Ok(path) => info!("Exported history to {}", path.display()),
            Err(ExportError::Empty) => info!("No samples recorded, nothing exported"),
            Err(e) => {
                handle.shutdown().await;
                return Err(e.into());
            }
        }
    }
    Ok(handle.shutdown().await)
}

fn start_engine(args: &Args, config: SessionConfig, topic: &str) -> Result<(EngineHandle, SimFeed), SimError> {
    let (transport, publisher) = ChannelTransport::pair(topic);
    let box_size = config.box_size;
    let engine = LocatorEngine::new(
        TokioContext::shared(),
        Arc::new(transport),
        EngineConfig::new(topic, config),
    )?;
    lock_session(&engine.session()).set_viewport(Viewport::new(1280.0, 720.0));

    let handle = engine.start(frame_sink(args, box_size)?);
    let feed = SimFeed::new(publisher, FaultConfig::none(), args.seed);
    Ok((handle, feed))
}

async fn run_live(args: &Args, config: SessionConfig, seed: u64) -> Result<SessionStats, SimError> {
    let box_size = config.box_size;
    let (handle, mut feed) = start_engine(args, config, "locator/live")?;
    let mut producer = HelixProducer::new(seed, box_size);

    info!("Live helix feed for {:.1}s", args.duration);
    let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(args.duration.max(0.0));
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        let point = producer.next_point();
        let style = producer.pick_style();
        feed.step(&point, style, SystemTime::now())?;
    }

    wait_for_drain(&handle, feed.stats().delivered).await;
    finish(handle, args.export.as_ref()).await
}

async fn run_stdin(args: &Args, config: SessionConfig) -> Result<SessionStats, SimError> {
    let (handle, mut feed) = start_engine(args, config, "locator/stdin")?;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        feed.publish_raw(&line, SystemTime::now())?;
    }

    wait_for_drain(&handle, feed.stats().delivered).await;
    finish(handle, args.export.as_ref()).await
}

fn run_engine_mode(args: &Args, config: SessionConfig, seed: u64) -> Result<SessionStats, SimError> {
    // `simulate` in the config file selects the helix feed unless stdin was asked for
    let live = !args.stdin && (args.live || config.simulate);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        if live {
            run_live(args, config, seed).await
        } else {
            run_stdin(args, config).await
        }
    })
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if !args.json {
        info!("Locator Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = match session_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Determine base seed
    let seed = if args.seed == 0 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if args.live || args.stdin || config.simulate {
        match run_engine_mode(&args, config, seed) {
            Ok(stats) => {
                if args.json {
                    println!("{}", serde_json::json!({ "seed": seed, "stats": stats }));
                } else {
                    info!(
                        "Session finished: {} accepted, {} rejected, {} clears",
                        stats.accepted, stats.rejected, stats.clears
                    );
                }
            }
            Err(e) => {
                error!("Engine run failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: helix, wraparound, malformed, dropout, clear_midstream, all");
                std::process::exit(1);
            }
        }
    };

    let mut runner = ScenarioRunner::new(seed)
        .with_duration(args.duration)
        .with_config(config);
    if let Some(dir) = &args.export {
        runner = runner.with_export_dir(dir);
    }

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let result = runner.run(*scenario);
        if !args.json {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED: {} accepted, {} rejected",
                    scenario.name(),
                    seed,
                    result.stats.accepted,
                    result.stats.rejected
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let total = results.len();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": results.iter().map(ScenarioResult::to_json).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
