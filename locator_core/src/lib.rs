//! Locator Core - live 3-D trajectory engine
//!
//! Turns a stream of coordinate messages into a renderable trail:
//! 1. **Ingestion**: structured or text payloads parsed into finite triples,
//!    made origin-relative and scaled into scene units
//! 2. **Storage**: a fixed-capacity ring for the visible trail and a
//!    FIFO-capped history for inspection and CSV export
//! 3. **Viewing**: a smoothed follow camera and a screen-space picker that
//!    maps the pointer back to the nearest recorded sample

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod picker;
pub mod render;
pub mod sample;
pub mod session;
pub mod trail;

#[cfg(feature = "visualization")]
pub mod visualization;

// Re-export key types for convenience
pub use camera::{CameraController, CameraPose, FollowGrid, Lens, Rotation, ViewProjection, Viewport};
pub use config::SessionConfig;
pub use engine::{EngineConfig, EngineHandle, LocatorEngine};
pub use error::{ConfigError, ExportError, RenderError, SampleError};
pub use history::{ExportSnapshot, HistoryEntry, HistoryStore, CSV_HEADER};
pub use picker::{PickHit, ScreenPicker};
pub use render::{Frame, FrameRecorder, FrameSink, NullSink, RenderLoop, TracingSink};
pub use sample::{Normalizer, RawSample, SamplePayload, SceneSample};
pub use session::{lock_session, Session, SessionStats, SharedSession};
pub use trail::TrailBuffer;

#[cfg(feature = "visualization")]
pub use visualization::RerunSink;
