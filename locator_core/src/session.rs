//! Session - owns everything one visualization instance needs.
//!
//! Origin, trail, history and camera live together in one `Session` so that
//! a clear resets them as a unit and concurrent sessions never share state.
//!
//! # Data Flow
//!
//! ```text
//! message ──► SamplePayload ──► RawSample ──► Normalizer ──► SceneSample
//!                                   │                            │
//!                                   └───────► HistoryStore ◄─────┤
//!                                                                ▼
//!                                                           TrailBuffer
//! ```

use chrono::{DateTime, Utc};
use locator_env::{InboundMessage, SessionId};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::camera::{CameraController, ViewProjection, Viewport};
use crate::config::SessionConfig;
use crate::error::{ConfigError, ExportError, SampleError};
use crate::history::{ExportSnapshot, HistoryEntry, HistoryStore};
use crate::picker::{PickHit, ScreenPicker};
use crate::render::Frame;
use crate::sample::{Normalizer, RawSample, SamplePayload, SceneSample};
use crate::trail::TrailBuffer;

/// A session shared between the ingestion and render drivers.
pub type SharedSession = Arc<Mutex<Session>>;

/// Locks a shared session, recovering the guard if a holder panicked.
///
/// Every mutation completes before the guard is dropped, so a poisoned
/// session is still consistent.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters reported to the UI and the CLI summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Samples accepted since the session started
    pub accepted: u64,
    /// Samples rejected since the session started
    pub rejected: u64,
    /// Number of clears performed
    pub clears: u64,
}

/// One visualization instance.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    normalizer: Normalizer,
    trail: TrailBuffer,
    history: HistoryStore,
    camera: CameraController,
    picker: ScreenPicker,
    viewport: Viewport,
    /// View-projection of the most recently rendered frame
    last_projection: Option<ViewProjection>,
    hovered: Option<PickHit>,
    stats: SessionStats,
    released: bool,
}

impl Session {
    /// Creates a session after validating the config.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_id(SessionId::new(), config)
    }

    /// Creates a session with a caller-chosen id (deterministic in simulation).
    pub fn with_id(id: SessionId, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            normalizer: Normalizer::new(config.visual_scale),
            trail: TrailBuffer::new(config.max_points),
            history: HistoryStore::new(config.max_saved_points),
            camera: CameraController::new(&config),
            picker: ScreenPicker::from_config(&config),
            viewport: Viewport::new(0.0, 0.0),
            last_projection: None,
            hovered: None,
            stats: SessionStats::default(),
            released: false,
            config,
        })
    }

    /// Wraps the session for sharing between drivers.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The origin in effect, if a sample has been accepted since the last clear.
    pub fn origin(&self) -> Option<&RawSample> {
        self.normalizer.origin()
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    /// Camera input (drag, zoom, grid toggle).
    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // =========================================================================
    // INGESTION
    // =========================================================================

    /// Parses and ingests one transport message.
    pub fn ingest_message(&mut self, message: &InboundMessage) -> Result<SceneSample, SampleError> {
        let payload = SamplePayload::from_bytes(&message.payload);
        self.ingest(&payload, DateTime::<Utc>::from(message.received_at))
    }

    /// Parses and ingests a payload stamped with `at`.
    ///
    /// Rejections are logged and counted; no buffer is touched.
    pub fn ingest(&mut self, payload: &SamplePayload, at: DateTime<Utc>) -> Result<SceneSample, SampleError> {
        match payload.to_raw(at) {
            Ok(raw) => self.ingest_raw(raw),
            Err(e) => {
                self.stats.rejected += 1;
                warn!(session = %self.id, payload = %payload, reason = %e, "malformed coordinate rejected");
                Err(e)
            }
        }
    }

    /// Normalizes a raw sample and appends it to trail and history.
    pub fn ingest_raw(&mut self, raw: RawSample) -> Result<SceneSample, SampleError> {
        for (axis, value) in [('x', raw.x), ('y', raw.y), ('z', raw.z)] {
            if !value.is_finite() {
                self.stats.rejected += 1;
                warn!(session = %self.id, axis = %axis, value, "non-finite coordinate rejected");
                return Err(SampleError::NonFinite { axis, value });
            }
        }

        if self.normalizer.origin().is_none() {
            info!(session = %self.id, x = raw.x, y = raw.y, z = raw.z, "origin set");
        }
        let scene = self.normalizer.normalize(&raw);
        self.trail.push(scene);
        self.history.append(HistoryEntry::new(raw, scene));
        self.stats.accepted += 1;
        Ok(scene)
    }

    /// Ends the current trail and history; the next sample sets a new origin.
    pub fn clear(&mut self) {
        self.trail.clear();
        self.history.clear();
        self.normalizer.reset();
        self.hovered = None;
        self.stats.clears += 1;
        info!(session = %self.id, "session cleared");
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Updates the rendering surface size.
    ///
    /// A size change drops the last frame's projection and any hover, so
    /// picking waits for a frame rendered at the new size.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.last_projection = None;
            self.hovered = None;
        }
        self.viewport = viewport;
    }

    /// Advances the camera one tick and snapshots everything a frame needs.
    pub fn render_frame(&mut self, index: u64) -> Frame {
        let marker = self.trail.marker();
        let pose = self.camera.tick(marker.point());
        self.last_projection = pose.view_projection(self.camera.lens(), &self.viewport);

        Frame {
            index,
            trail: self.trail.snapshot_ordered(),
            marker,
            pose,
            follow_grid: self.camera.follow_grid(),
            viewport: self.viewport,
            tooltip: self.hovered.as_ref().map(|hit| hit.tooltip.clone()),
        }
    }

    // =========================================================================
    // POINTER INSPECTION
    // =========================================================================

    /// Resolves the history entry under the pointer against the last rendered frame.
    pub fn hover(&mut self, x: f64, y: f64) -> Option<&PickHit> {
        self.hovered = match &self.last_projection {
            Some(projection) => self
                .picker
                .pick(&self.history, projection, Point2::new(x, y), &self.viewport),
            None => None,
        };
        if let Some(hit) = &self.hovered {
            debug!(session = %self.id, tooltip = %hit.tooltip, distance_px = hit.distance_px, "hover hit");
        }
        self.hovered.as_ref()
    }

    /// Pointer left the surface.
    pub fn leave(&mut self) {
        self.hovered = None;
    }

    pub fn hovered(&self) -> Option<&PickHit> {
        self.hovered.as_ref()
    }

    /// Click on the surface: clipboard text of the hovered raw coordinate.
    pub fn click(&self) -> Option<String> {
        let text = self.hovered.as_ref()?.entry.clipboard_text();
        info!(session = %self.id, coords = %text, "copied coordinates");
        Some(text)
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    /// History as CSV text; `ExportError::Empty` when there is nothing to export.
    pub fn export_csv(&self) -> Result<String, ExportError> {
        if self.history.is_empty() {
            info!(session = %self.id, "nothing to export");
            return Err(ExportError::Empty);
        }
        Ok(self.history.to_csv())
    }

    /// CSV text and filename captured for writing outside the session lock.
    pub fn export_snapshot(&self, now: &DateTime<Utc>) -> Result<ExportSnapshot, ExportError> {
        self.history.export_snapshot(now)
    }

    /// Writes the history CSV into `dir`.
    pub fn export_to_dir(&self, dir: impl AsRef<Path>, now: &DateTime<Utc>) -> Result<PathBuf, ExportError> {
        self.history.export_to_dir(dir, now)
    }

    /// Frees buffer storage. Only called once both drivers have stopped.
    pub(crate) fn release(&mut self) {
        self.trail.release();
        self.history.release();
        self.normalizer.reset();
        self.hovered = None;
        self.last_projection = None;
        self.released = true;
        info!(session = %self.id, "session released");
    }
}
