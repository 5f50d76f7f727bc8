//! Core environment context trait for the Locator engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the ingestion and render
/// drivers can run against a wall clock in production and a virtual clock
/// in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and the system clock
/// - **Simulation**: `SimContext` - manually advanced virtual clock
#[async_trait]
pub trait LocatorContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for frame pacing and elapsed-time measurements.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp incoming samples.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a named background task and returns its join handle.
    ///
    /// The engine keeps the handle so teardown can wait for the driver
    /// to finish before buffers are released.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
}
