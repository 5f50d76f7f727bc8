//! Error types for the Locator environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The transport has been closed and accepts no more messages
    #[error("Transport closed")]
    TransportClosed,
}
