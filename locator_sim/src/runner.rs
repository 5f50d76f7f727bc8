//! Scenario runner - drives a session through a simulated feed, step by step.
//!
//! Each tick advances the virtual clock by one sample interval, publishes one
//! producer sample through the fault-injecting feed, drains the transport
//! into the session, renders the frames that fall inside the interval and
//! then checks the session invariants. Everything is seeded, so a given
//! `(scenario, seed)` pair always replays identically.

use chrono::{DateTime, Utc};
use locator_core::{
    HistoryEntry, SceneSample, Session, SessionConfig, SessionStats, Viewport,
};
use locator_env::{ChannelTransport, LocatorContext, SampleTransport, SessionId};
use nalgebra::Point3;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::context::SimContext;
use crate::error::SimError;
use crate::feed::{FaultConfig, FeedOutcome, FeedStats, SimFeed};
use crate::producer::{HelixProducer, SAMPLE_INTERVAL};
use crate::scenarios::ScenarioId;

/// Surface size used for projection and picking.
const SIM_VIEWPORT: Viewport = Viewport {
    width: 800.0,
    height: 600.0,
};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether every invariant held on every tick
    pub passed: bool,

    /// Samples produced
    pub total_ticks: u64,

    /// Frames rendered
    pub frames_rendered: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Session counters at the end of the run
    pub stats: SessionStats,

    /// Feed counters at the end of the run
    pub feed: FeedStats,

    /// Trail points at the end of the run
    pub trail_len: usize,

    /// History entries at the end of the run
    pub history_len: usize,

    /// CSV written with `--export`
    pub export_path: Option<PathBuf>,

    /// First violated invariant, if any
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "scenario": self.scenario.name(),
            "seed": self.seed,
            "passed": self.passed,
            "ticks": self.total_ticks,
            "frames": self.frames_rendered,
            "time_secs": self.final_time_secs,
            "stats": self.stats,
            "feed": self.feed,
            "trail_len": self.trail_len,
            "history_len": self.history_len,
            "export_path": self.export_path.as_ref().map(|p| p.display().to_string()),
            "failure_reason": self.failure_reason,
        })
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Simulated duration in seconds
    duration_secs: f64,

    /// Base session config; scenarios may override capacities
    config: SessionConfig,

    /// Where to write each scenario's CSV
    export_dir: Option<PathBuf>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            duration_secs: 10.0,
            config: SessionConfig::default(),
            export_dir: None,
        }
    }

    /// Sets the simulated duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Exports each scenario's history under `dir/<scenario>/`.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    fn ticks(&self) -> u64 {
        (self.duration_secs / SAMPLE_INTERVAL.as_secs_f64()).ceil().max(1.0) as u64
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let plan = self.plan(scenario);
        let mut harness = match Harness::new(self.seed, &plan) {
            Ok(harness) => harness,
            Err(e) => return self.aborted(scenario, e),
        };

        for tick in 0..plan.ticks {
            if plan.clear_at == Some(tick) {
                harness.clear();
            }
            if let Err(e) = harness.step() {
                harness.fail(format!("tick {tick}: {e}"));
                break;
            }
            if tick % 50 == 0 {
                debug!(
                    "  t={:.2}s | trail={} | history={}",
                    harness.ctx.now().as_secs_f64(),
                    harness.session.trail().count(),
                    harness.session.history().len()
                );
            }
        }
        harness.finish(&plan);

        let export_path = match &self.export_dir {
            Some(dir) => match harness.export(dir.join(scenario.name())) {
                Ok(path) => Some(path),
                Err(e) => {
                    harness.fail(format!("export failed: {e}"));
                    None
                }
            },
            None => None,
        };

        let passed = harness.failures.is_empty();
        if passed {
            info!("✓ {} complete: {} ticks, {} frames", scenario.name(), plan.ticks, harness.frames);
        } else {
            warn!("✗ {} violated {} invariant check(s)", scenario.name(), harness.failures.len());
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: plan.ticks,
            frames_rendered: harness.frames,
            final_time_secs: harness.ctx.now().as_secs_f64(),
            stats: harness.session.stats(),
            feed: harness.feed.stats(),
            trail_len: harness.session.trail().count(),
            history_len: harness.session.history().len(),
            export_path,
            failure_reason: harness.failures.into_iter().next(),
        }
    }

    fn aborted(&self, scenario: ScenarioId, error: SimError) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks: 0,
            frames_rendered: 0,
            final_time_secs: 0.0,
            stats: SessionStats::default(),
            feed: FeedStats::default(),
            trail_len: 0,
            history_len: 0,
            export_path: None,
            failure_reason: Some(error.to_string()),
        }
    }

    fn plan(&self, scenario: ScenarioId) -> Plan {
        let ticks = self.ticks();
        let mut plan = Plan {
            scenario,
            ticks,
            config: self.config.clone(),
            faults: FaultConfig::none(),
            clear_at: None,
            noise: 0.0,
        };
        match scenario {
            ScenarioId::Helix => {
                plan.noise = 0.01;
            }
            ScenarioId::Wraparound => {
                plan.config.max_points = 50;
                plan.config.max_saved_points = 120;
                plan.ticks = ticks.max(200);
            }
            ScenarioId::Malformed => {
                plan.faults.drop_rate = 0.05;
                plan.faults.malformed_rate = 0.2;
                plan.ticks = ticks.max(200);
            }
            ScenarioId::Dropout => {
                plan.ticks = ticks.max(30);
                plan.faults.dropout = Some(plan.ticks / 3..plan.ticks * 2 / 3);
            }
            ScenarioId::ClearMidstream => {
                plan.ticks = ticks.max(20);
                plan.clear_at = Some(plan.ticks / 2);
            }
        }
        plan
    }
}

/// Per-scenario parameters.
struct Plan {
    scenario: ScenarioId,
    ticks: u64,
    config: SessionConfig,
    faults: FaultConfig,
    clear_at: Option<u64>,
    noise: f64,
}

/// Live state of one scenario run.
struct Harness {
    ctx: SimContext,
    transport: ChannelTransport,
    feed: SimFeed,
    producer: HelixProducer,
    session: Session,
    frames_per_tick: u64,
    frames: u64,
    /// Every point the producer emitted, in order
    produced: Vec<Point3<f64>>,
    /// Raw origin expected since the last clear
    expected_origin: Option<Point3<f64>>,
    /// Marker position when the link went down
    marker_at_dropout: Option<SceneSample>,
    failures: Vec<String>,
}

impl Harness {
    fn new(seed: u64, plan: &Plan) -> Result<Self, SimError> {
        let ctx = SimContext::new(seed);
        let (transport, publisher) = ChannelTransport::pair(format!("sim/{}", plan.scenario.name()));
        let feed = SimFeed::new(publisher, plan.faults.clone(), seed);

        let mut producer = HelixProducer::new(seed, plan.config.box_size);
        if plan.noise > 0.0 {
            producer = producer.with_noise(plan.noise);
        }

        let mut session = Session::with_id(SessionId::from_seed(seed), plan.config.clone())?;
        session.set_viewport(SIM_VIEWPORT);

        let frames_per_tick = (SAMPLE_INTERVAL.as_secs_f64() * plan.config.frame_rate_hz as f64)
            .round()
            .max(1.0) as u64;

        Ok(Self {
            ctx,
            transport,
            feed,
            producer,
            session,
            frames_per_tick,
            frames: 0,
            produced: Vec::with_capacity(plan.ticks as usize),
            expected_origin: None,
            marker_at_dropout: None,
            failures: Vec::new(),
        })
    }

    fn fail(&mut self, reason: String) {
        if self.failures.len() < 16 {
            warn!(reason = %reason, "invariant violated");
        }
        self.failures.push(reason);
    }

    fn check(&mut self, ok: bool, reason: impl FnOnce() -> String) {
        if !ok {
            self.fail(reason());
        }
    }

    fn clear(&mut self) {
        self.session.clear();
        self.expected_origin = None;

        let s = &self.session;
        let cleared = s.origin().is_none()
            && s.history().is_empty()
            && s.trail().is_empty()
            && s.trail().marker() == SceneSample::ORIGIN;
        self.check(cleared, || "clear left state behind".to_string());
    }

    fn step(&mut self) -> Result<(), SimError> {
        let tick = self.feed.tick();
        self.ctx.advance_time(SAMPLE_INTERVAL);

        let point = self.producer.next_point();
        let style = self.producer.pick_style();
        self.produced.push(point);

        let accepted_before = self.session.stats().accepted;
        let outcome = self.feed.step(&point, style, self.ctx.system_time())?;
        while let Some(message) = self.transport.try_recv() {
            // Rejections are counted by the session
            let _ = self.session.ingest_message(&message);
        }

        match outcome {
            FeedOutcome::Delivered => self.check_delivered(tick, &point),
            FeedOutcome::Malformed | FeedOutcome::Dropped => {
                let unchanged = self.session.stats().accepted == accepted_before;
                self.check(unchanged, || format!("tick {tick}: {outcome:?} sample was accepted"));
            }
            FeedOutcome::Offline => self.check_offline(tick),
        }
        if outcome != FeedOutcome::Offline {
            self.marker_at_dropout = None;
        }

        for _ in 0..self.frames_per_tick {
            self.render_and_check(tick);
        }
        self.check_buffers(tick);
        Ok(())
    }

    fn check_delivered(&mut self, tick: u64, point: &Point3<f64>) {
        if self.expected_origin.is_none() {
            self.expected_origin = Some(*point);
        }

        let Some(latest) = self.session.history().latest().copied() else {
            self.fail(format!("tick {tick}: delivered sample missing from history"));
            return;
        };
        let raw = latest.raw.position();
        self.check(raw == *point, || format!("tick {tick}: raw {raw:?} != produced {point:?}"));

        let expected_at = DateTime::<Utc>::from(self.ctx.system_time());
        self.check(latest.raw.timestamp == expected_at, || {
            format!("tick {tick}: sample stamped {} not {}", latest.raw.timestamp, expected_at)
        });

        if let Some(origin) = self.expected_origin {
            let actual = self.session.origin().map(|o| o.position());
            self.check(actual == Some(origin), || {
                format!("tick {tick}: origin moved to {actual:?}, expected {origin:?}")
            });

            let scale = self.session.config().visual_scale;
            let expected = (raw - origin) * scale;
            let scene = latest.scene;
            let close = (scene.sx - expected.x).abs() < 1e-9
                && (scene.sy - expected.y).abs() < 1e-9
                && (scene.sz - expected.z).abs() < 1e-9;
            self.check(close, || format!("tick {tick}: scene {scene:?} != (raw - origin) * scale"));
        }

        let marker = self.session.trail().marker();
        self.check(marker == latest.scene, || format!("tick {tick}: marker {marker:?} lags latest sample"));
    }

    fn check_offline(&mut self, tick: u64) {
        let marker = self.session.trail().marker();
        let before = *self.marker_at_dropout.get_or_insert(marker);
        self.check(marker == before, || format!("tick {tick}: marker moved while link was down"));

        let state = self.transport.state();
        self.check(!state.connected && state.subscribed, || {
            format!("tick {tick}: link state {state:?} during dropout")
        });
    }

    fn render_and_check(&mut self, tick: u64) {
        let frame = self.session.render_frame(self.frames);
        self.frames += 1;

        let snapshot = self.session.trail().snapshot_ordered();
        self.check(frame.trail == snapshot, || format!("tick {tick}: frame trail out of order"));
        self.check(frame.pose.look_at == frame.marker.point(), || {
            format!("tick {tick}: camera not looking at marker")
        });

        // The marker sits at the look-at point, i.e. the viewport centre
        let centre = (SIM_VIEWPORT.width / 2.0, SIM_VIEWPORT.height / 2.0);
        let has_history = !self.session.history().is_empty();
        match self.session.hover(centre.0, centre.1).cloned() {
            Some(hit) => {
                self.check(hit.distance_px < 1e-6, || {
                    format!("tick {tick}: centre pick {:.3}px away", hit.distance_px)
                });
                let tooltip = hit.entry.tooltip();
                self.check(hit.tooltip == tooltip, || format!("tick {tick}: tooltip mismatch"));
            }
            None => self.check(!has_history, || format!("tick {tick}: centre pick missed the marker")),
        }
        self.session.leave();
    }

    fn check_buffers(&mut self, tick: u64) {
        let (within, in_lockstep, all_finite, trail_len, history_len) = {
            let config = self.session.config();
            let trail = self.session.trail();
            let history = self.session.history();
            let (trail_len, history_len) = (trail.count(), history.len());

            // Trail and history are appended together, so their tails agree
            let k = trail_len.min(history_len);
            let trail_tail: Vec<SceneSample> = trail.iter_ordered().skip(trail_len - k).copied().collect();
            let history_tail: Vec<SceneSample> = history.iter().skip(history_len - k).map(|e| e.scene).collect();

            let all_finite = history.iter().all(|e| {
                e.scene.point().iter().all(|v| v.is_finite()) && e.raw.position().iter().all(|v| v.is_finite())
            });
            (
                trail_len <= config.max_points && history_len <= config.max_saved_points,
                trail_tail == history_tail,
                all_finite,
                trail_len,
                history_len,
            )
        };

        self.check(within, || format!("tick {tick}: buffers over capacity ({trail_len}, {history_len})"));
        self.check(in_lockstep, || format!("tick {tick}: trail and history disagree"));
        self.check(all_finite, || format!("tick {tick}: non-finite value stored"));

        let stats = self.session.stats();
        let feed = self.feed.stats();
        self.check(stats.accepted == feed.delivered && stats.rejected == feed.malformed, || {
            format!("tick {tick}: session {stats:?} disagrees with feed {feed:?}")
        });
    }

    fn finish(&mut self, plan: &Plan) {
        match plan.scenario {
            ScenarioId::Wraparound => {
                let trail = self.session.trail();
                let wrapped = trail.is_wrapped() && trail.count() == plan.config.max_points;
                self.check(wrapped, || "trail never wrapped".to_string());

                let history_len = self.session.history().len();
                self.check(history_len == plan.config.max_saved_points, || {
                    format!("history holds {history_len} entries")
                });

                let oldest = self.session.history().iter().next().map(|e: &HistoryEntry| e.raw.position());
                let expected = self.produced.len().checked_sub(history_len).map(|i| self.produced[i]);
                self.check(oldest == expected, || "history evicted out of order".to_string());
            }
            ScenarioId::Malformed => {
                let feed = self.feed.stats();
                self.check(feed.malformed > 0, || {
                    format!("fault injection never fired: {feed:?}")
                });
            }
            ScenarioId::Dropout => {
                let feed = self.feed.stats();
                self.check(feed.offline > 0, || "link never went down".to_string());
                let live = self.transport.state().is_live();
                self.check(live, || "link not restored after dropout".to_string());
            }
            ScenarioId::ClearMidstream => {
                let stats = self.session.stats();
                self.check(stats.clears == 1, || format!("expected one clear, saw {}", stats.clears));

                let first = self.session.history().iter().next().copied();
                let reset = first.map_or(false, |e| e.scene == SceneSample::ORIGIN);
                self.check(reset, || "first post-clear sample is not the scene origin".to_string());

                let history_len = self.session.history().len() as u64;
                self.check(history_len < plan.ticks, || "history survived the clear".to_string());
            }
            ScenarioId::Helix => {
                let stats = self.session.stats();
                self.check(stats.rejected == 0 && stats.accepted == plan.ticks, || {
                    format!("clean feed lost samples: {stats:?}")
                });
            }
        }
    }

    fn export(&self, dir: PathBuf) -> Result<PathBuf, SimError> {
        std::fs::create_dir_all(&dir)?;
        let now = DateTime::<Utc>::from(self.ctx.system_time());
        Ok(self.session.export_to_dir(dir, &now)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42).with_duration(6.0);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario.name(),
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let runner = ScenarioRunner::new(7).with_duration(3.0);
        let a = runner.run(ScenarioId::Malformed);
        let b = runner.run(ScenarioId::Malformed);
        assert_eq!(a.stats, b.stats);
        assert_eq!(a.feed, b.feed);
        assert_eq!(a.frames_rendered, b.frames_rendered);
    }

    #[test]
    fn test_wraparound_fills_both_buffers() {
        let result = ScenarioRunner::new(1).with_duration(1.0).run(ScenarioId::Wraparound);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 200);
        assert_eq!(result.trail_len, 50);
        assert_eq!(result.history_len, 120);
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = SessionConfig {
            visual_scale: 0.0,
            ..SessionConfig::default()
        };
        let result = ScenarioRunner::new(1).with_config(config).run(ScenarioId::Helix);
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("config"));
    }

    #[test]
    fn test_export_writes_csv_per_scenario() {
        let dir = std::env::temp_dir().join(format!("locator-sim-export-{}", std::process::id()));
        let result = ScenarioRunner::new(3)
            .with_duration(0.6)
            .with_export_dir(&dir)
            .run(ScenarioId::Helix);

        let path = result.export_path.clone().unwrap();
        assert!(path.starts_with(dir.join("helix")));
        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count() as u64, result.stats.accepted + 1);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("trajectory_2024-01-01T"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
