//! Simulated broker feed with fault injection.
//!
//! Publishes producer output through a `ChannelPublisher`, the same path a
//! live broker bridge would use, while injecting the faults a real link
//! shows: lost messages, garbage payloads and silent dropouts.

use locator_env::{ChannelPublisher, EnvError};
use nalgebra::Point3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::ops::Range;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::producer::PayloadStyle;

/// Payloads the session must reject.
const MALFORMED_PAYLOADS: &[&str] = &[
    "",
    "   ",
    "1.0, 2.0",
    "1,2,3,4",
    "a,b,c",
    "1;2;3",
    "NaN,0,0",
    "0,inf,0",
    r#"{"x":1,"y":null,"z":3}"#,
    r#"{"x":"one","y":2,"z":3}"#,
    r#"{"x":1,"y":2}"#,
    r#"{"x":[1,2],"y":2,"z":3}"#,
];

/// Fault injection parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultConfig {
    /// Probability a message is silently lost (0.0 - 1.0)
    pub drop_rate: f64,

    /// Probability a message is replaced by a malformed payload (0.0 - 1.0)
    pub malformed_rate: f64,

    /// Tick range during which the link is down and nothing is delivered
    pub dropout: Option<Range<u64>>,
}

impl FaultConfig {
    /// A clean link.
    pub fn none() -> Self {
        Self::default()
    }
}

/// What happened to one produced sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Published as a valid payload
    Delivered,
    /// Replaced by a malformed payload
    Malformed,
    /// Lost in transit
    Dropped,
    /// Link down (dropout window)
    Offline,
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub delivered: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub offline: u64,
}

/// Fault-injecting publisher.
pub struct SimFeed {
    publisher: ChannelPublisher,
    faults: FaultConfig,
    rng: ChaCha8Rng,
    tick: u64,
    stats: FeedStats,
}

impl SimFeed {
    /// Creates a feed and reports the link as connected and subscribed.
    pub fn new(publisher: ChannelPublisher, faults: FaultConfig, seed: u64) -> Self {
        publisher.connect();
        Self {
            publisher,
            faults,
            rng: ChaCha8Rng::seed_from_u64(seed ^ 0xfeed_5eed),
            tick: 0,
            stats: FeedStats::default(),
        }
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn in_dropout(&self) -> bool {
        self.faults.dropout.as_ref().map_or(false, |w| w.contains(&self.tick))
    }

    /// Publishes one sample (or its faulty replacement) stamped `at`.
    pub fn step(&mut self, point: &Point3<f64>, style: PayloadStyle, at: SystemTime) -> Result<FeedOutcome, EnvError> {
        let outcome = self.deliver(point, style, at);
        self.tick += 1;
        outcome
    }

    fn deliver(&mut self, point: &Point3<f64>, style: PayloadStyle, at: SystemTime) -> Result<FeedOutcome, EnvError> {
        let offline = self.in_dropout();
        let state = self.publisher.state();
        if offline && state.connected {
            info!(tick = self.tick, "link down");
            self.publisher.set_connected(false);
        } else if !offline && !state.connected && state.subscribed {
            info!(tick = self.tick, "link restored");
            self.publisher.set_connected(true);
        }

        if offline {
            self.stats.offline += 1;
            return Ok(FeedOutcome::Offline);
        }
        if self.rng.gen_bool(self.faults.drop_rate.clamp(0.0, 1.0)) {
            self.stats.dropped += 1;
            return Ok(FeedOutcome::Dropped);
        }
        if self.rng.gen_bool(self.faults.malformed_rate.clamp(0.0, 1.0)) {
            let garbage = MALFORMED_PAYLOADS[self.rng.gen_range(0..MALFORMED_PAYLOADS.len())];
            debug!(tick = self.tick, payload = garbage, "injecting malformed payload");
            self.publisher.publish(garbage, at)?;
            self.stats.malformed += 1;
            return Ok(FeedOutcome::Malformed);
        }

        self.publisher.publish(style.render(point), at)?;
        self.stats.delivered += 1;
        Ok(FeedOutcome::Delivered)
    }

    /// Publishes an arbitrary payload unchanged (stdin bridge).
    pub fn publish_raw(&mut self, payload: &str, at: SystemTime) -> Result<(), EnvError> {
        self.publisher.publish(payload, at)?;
        self.stats.delivered += 1;
        Ok(())
    }
}
