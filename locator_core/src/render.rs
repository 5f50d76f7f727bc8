//! Frame production and presentation.
//!
//! The render driver holds the session lock only long enough to advance the
//! camera and copy the ordered trail into a [`Frame`]; presentation to a
//! [`FrameSink`] happens after the lock is released so ingestion is never
//! blocked by a slow surface.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

use crate::camera::{CameraPose, FollowGrid, Viewport};
use crate::error::RenderError;
use crate::sample::SceneSample;
use crate::session::{lock_session, SharedSession};

/// Everything the surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic frame counter
    pub index: u64,
    /// Trail points, oldest first
    pub trail: Vec<SceneSample>,
    /// Target marker position
    pub marker: SceneSample,
    pub pose: CameraPose,
    pub follow_grid: FollowGrid,
    pub viewport: Viewport,
    /// Hover text, when the pointer is over a point
    pub tooltip: Option<String>,
}

/// Destination for rendered frames.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        (**self).present(frame)
    }
}

/// Discards frames. Used for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Logs a one-line summary of each frame at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FrameSink for TracingSink {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        trace!(
            frame = frame.index,
            points = frame.trail.len(),
            marker_x = frame.marker.sx,
            marker_y = frame.marker.sy,
            marker_z = frame.marker.sz,
            tooltip = frame.tooltip.as_deref().unwrap_or(""),
            "frame"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    frames_presented: u64,
    last_frame: Option<Frame>,
}

/// Keeps the most recent frame for inspection by tests and the CLI.
///
/// Clones share state, so one clone can be handed to the engine while the
/// caller keeps the other.
#[derive(Debug, Default, Clone)]
pub struct FrameRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).frames_presented
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_frame
            .clone()
    }
}

impl FrameSink for FrameRecorder {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frames_presented += 1;
        state.last_frame = Some(frame.clone());
        Ok(())
    }
}

/// Per-tick render driver state.
///
/// `running` is shared with the engine handle so the UI can pause and
/// resume rendering without stopping ingestion.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    frame_index: u64,
    running: Arc<AtomicBool>,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag controlling whether ticks produce frames.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_index
    }

    /// Renders and presents one frame.
    ///
    /// # Returns
    /// * `Ok(true)` - A frame was presented
    /// * `Ok(false)` - Paused, nothing rendered
    /// * `Err(_)` - The sink failed; the session is unaffected
    pub fn tick(&mut self, session: &SharedSession, sink: &mut dyn FrameSink) -> Result<bool, RenderError> {
        if !self.is_running() {
            return Ok(false);
        }

        let frame = {
            let mut guard = lock_session(session);
            if guard.is_released() {
                return Ok(false);
            }
            guard.render_frame(self.frame_index)
        };
        self.frame_index += 1;

        sink.present(&frame)?;
        if frame.index % 600 == 0 {
            debug!(frame = frame.index, points = frame.trail.len(), "render heartbeat");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::sample::SamplePayload;
    use crate::session::Session;
    use chrono::{DateTime, Utc};

    fn shared() -> SharedSession {
        Session::new(SessionConfig::default()).unwrap().into_shared()
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap()
    }

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn present(&mut self, _frame: &Frame) -> Result<(), RenderError> {
            Err(RenderError::SurfaceUnavailable)
        }
    }

    #[test]
    fn test_tick_presents_ordered_trail() {
        let session = shared();
        {
            let mut s = lock_session(&session);
            for i in 0..3 {
                s.ingest(&SamplePayload::structured(i as f64, 0.0, 0.0), now()).unwrap();
            }
        }

        let mut recorder = FrameRecorder::new();
        let mut render = RenderLoop::new();
        assert!(render.tick(&session, &mut recorder).unwrap());
        assert!(render.tick(&session, &mut recorder).unwrap());

        let frame = recorder.last_frame().unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(recorder.frames_presented(), 2);
        let xs: Vec<f64> = frame.trail.iter().map(|p| p.sx).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        assert_eq!(frame.marker.sx, 2.0);
    }

    #[test]
    fn test_paused_loop_skips_frames() {
        let session = shared();
        let mut recorder = FrameRecorder::new();
        let mut render = RenderLoop::new();

        render.set_running(false);
        assert!(!render.tick(&session, &mut recorder).unwrap());
        assert_eq!(recorder.frames_presented(), 0);

        render.set_running(true);
        assert!(render.tick(&session, &mut recorder).unwrap());
        assert_eq!(render.frames_rendered(), 1);
    }

    #[test]
    fn test_sink_failure_leaves_session_intact() {
        let session = shared();
        lock_session(&session)
            .ingest(&SamplePayload::structured(1.0, 1.0, 1.0), now())
            .unwrap();

        let mut render = RenderLoop::new();
        assert!(matches!(
            render.tick(&session, &mut FailingSink),
            Err(RenderError::SurfaceUnavailable)
        ));
        assert_eq!(lock_session(&session).history().len(), 1);
    }

    #[test]
    fn test_recorder_clones_share_state() {
        let recorder = FrameRecorder::new();
        let mut handed_out = recorder.clone();
        let session = shared();
        RenderLoop::new().tick(&session, &mut handed_out).unwrap();
        assert_eq!(recorder.frames_presented(), 1);
    }
}
