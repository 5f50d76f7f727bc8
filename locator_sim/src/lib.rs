//! Locator Deterministic Simulation Harness
//!
//! Runs the Locator session against a synthetic, fault-injecting feed on a
//! virtual clock, so that ingestion, buffering, camera and picking can be
//! exercised reproducibly from a single 64-bit seed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                          │
//! │                                                              │
//! │  HelixProducer ──► SimFeed ──► ChannelTransport ──► Session  │
//! │   (seeded)        (faults)      (same as live)      │       │
//! │                                                     ▼       │
//! │  SimContext (virtual clock)            render + invariants  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use locator_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_duration(10.0).run(ScenarioId::Wraparound);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod feed;
mod producer;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use feed::{FaultConfig, FeedOutcome, FeedStats, SimFeed};
pub use producer::{HelixProducer, PayloadStyle, SAMPLE_INTERVAL};
pub use runner::{ScenarioResult, ScenarioRunner};
