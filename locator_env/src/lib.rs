//! Locator Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the Locator engine run
//! against a **Production** (tokio + live transport) or **Simulation**
//! (virtual clock + synthetic feed) environment without code changes.
//!
//! # Core Concept
//!
//! The engine never touches the outside world directly. Everything it needs
//! is intercepted here:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Sample delivery (`SampleTransport::recv()`) and connection state
//!
//! # Example
//!
//! ```ignore
//! use locator_env::{LocatorContext, SampleTransport};
//!
//! async fn ingest_loop<Ctx: LocatorContext, Tx: SampleTransport>(ctx: &Ctx, tx: &Tx) {
//!     loop {
//!         tokio::select! {
//!             msg = tx.recv() => handle_message(msg),
//!             _ = ctx.sleep(Duration::from_millis(16)) => render_tick(),
//!         }
//!     }
//! }
//! ```

mod channel;
mod context;
mod error;
mod tokio_impl;
mod transport;
mod types;

pub use channel::{ChannelPublisher, ChannelTransport};
pub use context::LocatorContext;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use transport::{SampleTransport, TransportState};
pub use types::{InboundMessage, SessionId};
