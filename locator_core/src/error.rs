//! Error types for the Locator core.
//!
//! None of these are fatal: each one is reported and the stream or the
//! user action that caused it simply moves on.

use thiserror::Error;

/// Reasons an incoming coordinate message is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    /// Message carried no content
    #[error("empty sample")]
    Empty,

    /// Structured payload did not have the expected shape
    #[error("malformed sample: {0}")]
    Malformed(String),

    /// Text payload did not contain exactly three components
    #[error("expected 3 components, found {found}")]
    WrongArity { found: usize },

    /// A component could not be parsed as a number
    #[error("component {axis} is not a number: {token:?}")]
    Unparseable { axis: char, token: String },

    /// A component was absent or null
    #[error("component {axis} is missing")]
    Missing { axis: char },

    /// A component parsed to NaN or an infinity
    #[error("component {axis} is not finite: {value}")]
    NonFinite { axis: char, value: f64 },
}

impl SampleError {
    /// Creates a malformed-shape error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Errors raised by history export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// History holds no entries; nothing is written
    #[error("nothing to export")]
    Empty,

    /// Writing the file failed
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or validating a session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A capacity was configured as zero
    #[error("{field} must be greater than zero")]
    ZeroCapacity { field: &'static str },

    /// visual_scale must be finite and non-zero
    #[error("invalid visual scale: {0}")]
    InvalidScale(f64),

    /// box_size must be finite and positive
    #[error("invalid box size: {0}")]
    InvalidBoxSize(f64),

    /// Clip planes must satisfy 0 < near < far, both finite
    #[error("invalid clip planes: near {near}, far {far}")]
    InvalidClipPlanes { near: f64, far: f64 },

    /// Vertical field of view must be finite and inside (0, 180) degrees
    #[error("invalid field of view: {0} degrees")]
    InvalidFieldOfView(f64),

    /// Pick tolerance must be finite and non-negative
    #[error("invalid pick tolerance: {0} px")]
    InvalidPickTolerance(f64),

    /// Reading the config file failed
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file was not valid JSON for `SessionConfig`
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while producing a frame.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Viewport has zero area or the surface is gone
    #[error("render surface unavailable")]
    SurfaceUnavailable,

    /// The frame sink refused the frame
    #[error("frame sink error: {0}")]
    Sink(String),
}

impl RenderError {
    /// Creates a sink error.
    pub fn sink(msg: impl std::fmt::Display) -> Self {
        Self::Sink(msg.to_string())
    }
}
