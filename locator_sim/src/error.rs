//! Error types for the simulation harness.

use locator_core::{ConfigError, ExportError, RenderError};
use locator_env::EnvError;
use thiserror::Error;

/// Errors that abort a simulation run or a live session.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("transport error: {0}")]
    Env(#[from] EnvError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
