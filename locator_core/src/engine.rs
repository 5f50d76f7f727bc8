//! Engine runtime - wires a session to a transport and a frame sink.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LocatorEngine                          │
//! │                                                               │
//! │   SampleTransport ──recv──► [ingest driver] ──┐               │
//! │                                               ▼               │
//! │                                     Arc<Mutex<Session>>       │
//! │                                               ▲               │
//! │   ctx.sleep(frame) ───────► [render driver] ──┘──► FrameSink  │
//! │                                                               │
//! │   EngineHandle::shutdown():                                   │
//! │     signal ─► close transport ─► join drivers ─► release      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Generic over the context and transport so the same drivers run on a
//! wall clock with a live feed, or on a virtual clock with a simulated one.

use locator_env::{LocatorContext, SampleTransport, SessionId, TransportState};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ConfigError, ExportError};
use crate::render::{FrameSink, RenderLoop};
use crate::session::{lock_session, Session, SessionStats, SharedSession};

/// Configuration for a locator engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Logical name (for logging)
    pub name: String,

    /// Session parameters
    pub session: SessionConfig,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>, session: SessionConfig) -> Self {
        Self {
            name: name.into(),
            session,
        }
    }
}

/// A locator engine ready to be started.
pub struct LocatorEngine<Ctx, Tx>
where
    Ctx: LocatorContext,
    Tx: SampleTransport,
{
    context: Arc<Ctx>,
    transport: Arc<Tx>,
    config: EngineConfig,
    session: SharedSession,
}

impl<Ctx, Tx> LocatorEngine<Ctx, Tx>
where
    Ctx: LocatorContext,
    Tx: SampleTransport,
{
    /// Creates an engine with a fresh session.
    pub fn new(context: Arc<Ctx>, transport: Arc<Tx>, config: EngineConfig) -> Result<Self, ConfigError> {
        let session = Session::new(config.session.clone())?;
        Ok(Self::with_session(context, transport, config, session))
    }

    /// Creates an engine around an existing session (deterministic ids in simulation).
    pub fn with_session(context: Arc<Ctx>, transport: Arc<Tx>, config: EngineConfig, session: Session) -> Self {
        Self {
            context,
            transport,
            config,
            session: session.into_shared(),
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Spawns the ingestion and render drivers.
    pub fn start<S>(self, sink: S) -> EngineHandle
    where
        S: FrameSink + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let id = lock_session(&self.session).id();
        let render = RenderLoop::new();
        let running = render.running_flag();

        info!(engine = %self.config.name, session = %id, "engine starting");

        let ingest = self.context.spawn(
            "locator-ingest",
            ingest_driver(Arc::clone(&self.transport), Arc::clone(&self.session), shutdown_rx.clone()),
        );
        let render = self.context.spawn(
            "locator-render",
            render_driver(
                Arc::clone(&self.context),
                Arc::clone(&self.session),
                render,
                Box::new(sink),
                shutdown_rx,
            ),
        );

        EngineHandle {
            name: self.config.name,
            id,
            session: self.session,
            transport: self.transport,
            shutdown_tx,
            running,
            ingest: Some(ingest),
            render: Some(render),
        }
    }
}

async fn ingest_driver<Tx: SampleTransport>(
    transport: Arc<Tx>,
    session: SharedSession,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            message = transport.recv() => message,
        };
        let Some(message) = message else {
            debug!("transport drained");
            break;
        };

        // Rejections are already logged and counted by the session
        let _ = lock_session(&session).ingest_message(&message);
    }
}

async fn render_driver<Ctx: LocatorContext>(
    context: Arc<Ctx>,
    session: SharedSession,
    mut render: RenderLoop,
    mut sink: Box<dyn FrameSink>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = lock_session(&session).config().frame_interval();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = context.sleep(interval) => {}
        }
        if let Err(e) = render.tick(&session, sink.as_mut()) {
            warn!(error = %e, "frame dropped");
        }
    }
    debug!(frames = render.frames_rendered(), "render driver stopped");
}

/// Control handle for a running engine.
///
/// Dropping the handle signals the drivers and closes the transport but
/// cannot wait for them; call [`EngineHandle::shutdown`] for an orderly stop.
pub struct EngineHandle {
    name: String,
    id: SessionId,
    session: SharedSession,
    transport: Arc<dyn SampleTransport>,
    shutdown_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    ingest: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The session shared with the drivers.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Connection lifecycle flags for the UI.
    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn stats(&self) -> SessionStats {
        lock_session(&self.session).stats()
    }

    /// Stops producing frames. Ingestion continues.
    pub fn pause(&self) {
        self.running.store(false, Ordering::Release);
        info!(engine = %self.name, "rendering paused");
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::Release);
        info!(engine = %self.name, "rendering resumed");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears trail, history and origin in one step.
    pub fn clear(&self) {
        lock_session(&self.session).clear();
    }

    pub fn export_csv(&self) -> Result<String, ExportError> {
        lock_session(&self.session).export_csv()
    }

    /// Writes the history CSV into `dir`.
    ///
    /// The session is locked only while the CSV text is captured; the file
    /// write runs with ingestion unblocked.
    pub fn export_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let snapshot = lock_session(&self.session).export_snapshot(&chrono::Utc::now())?;
        snapshot.write_to(dir)
    }

    fn signal_stop(&self) {
        self.shutdown_tx.send_replace(true);
        self.transport.close();
    }

    /// Stops both drivers and frees buffer storage.
    ///
    /// Order: signal, close transport, await drivers, release. No frame is
    /// rendered after the buffers are released.
    pub async fn shutdown(mut self) -> SessionStats {
        info!(engine = %self.name, session = %self.id, "engine shutting down");
        self.signal_stop();

        for handle in [self.ingest.take(), self.render.take()].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(engine = %self.name, error = %e, "driver task failed");
            }
        }

        let mut session = lock_session(&self.session);
        let stats = session.stats();
        session.release();
        info!(
            engine = %self.name,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "engine stopped"
        );
        stats
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.ingest.is_some() || self.render.is_some() {
            self.signal_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameRecorder;
    use locator_env::{ChannelPublisher, ChannelTransport, TokioContext};
    use std::time::{Duration, SystemTime};

    fn engine(config: SessionConfig) -> (LocatorEngine<TokioContext, ChannelTransport>, ChannelPublisher) {
        let (transport, publisher) = ChannelTransport::pair("locator/pos");
        let engine = LocatorEngine::new(
            TokioContext::shared(),
            Arc::new(transport),
            EngineConfig::new("test", config),
        )
        .unwrap();
        (engine, publisher)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let (transport, _publisher) = ChannelTransport::pair("locator/pos");
        let config = SessionConfig {
            max_points: 0,
            ..SessionConfig::default()
        };
        let result = LocatorEngine::new(
            TokioContext::shared(),
            Arc::new(transport),
            EngineConfig::new("bad", config),
        );
        assert!(matches!(result, Err(ConfigError::ZeroCapacity { field: "max_points" })));
    }

    #[tokio::test]
    async fn test_ingests_and_renders() {
        let (engine, publisher) = engine(SessionConfig::default());
        let recorder = FrameRecorder::new();
        let handle = engine.start(recorder.clone());

        publisher.connect();
        assert!(handle.transport_state().is_live());
        publisher.publish("10,5,2", SystemTime::now()).unwrap();
        publisher.publish(r#"{"x":12,"y":5,"z":2}"#, SystemTime::now()).unwrap();
        publisher.publish("not a point", SystemTime::now()).unwrap();

        let session = handle.session();
        wait_for(|| {
            let s = lock_session(&session);
            s.stats().accepted + s.stats().rejected == 3
        })
        .await;
        wait_for(|| recorder.last_frame().map_or(false, |f| f.trail.len() == 2)).await;

        let frame = recorder.last_frame().unwrap();
        assert_eq!(frame.marker.sx, 2.0);

        let stats = handle.shutdown().await;
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_after_drivers_stop() {
        let (engine, publisher) = engine(SessionConfig::default());
        let recorder = FrameRecorder::new();
        let session = engine.session();
        let handle = engine.start(recorder.clone());

        publisher.connect();
        for i in 0..20 {
            publisher.publish(format!("{i},0,0"), SystemTime::now()).unwrap();
        }
        wait_for(|| lock_session(&session).history().len() == 20).await;

        handle.shutdown().await;
        let presented = recorder.frames_presented();

        {
            let s = lock_session(&session);
            assert!(s.is_released());
            assert!(s.trail().is_empty());
            assert!(s.history().is_empty());
        }
        assert!(publisher.publish("1,2,3", SystemTime::now()).is_err());
        assert!(!publisher.state().is_live());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.frames_presented(), presented);
    }

    #[tokio::test]
    async fn test_pause_stops_frames_but_not_ingestion() {
        let (engine, publisher) = engine(SessionConfig::default());
        let recorder = FrameRecorder::new();
        let handle = engine.start(recorder.clone());

        wait_for(|| recorder.frames_presented() > 0).await;
        handle.pause();
        assert!(!handle.is_running());
        // Let any in-flight tick land
        tokio::time::sleep(Duration::from_millis(40)).await;
        let paused_at = recorder.frames_presented();

        publisher.publish("1,2,3", SystemTime::now()).unwrap();
        let session = handle.session();
        wait_for(|| lock_session(&session).history().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.frames_presented(), paused_at);

        handle.resume();
        wait_for(|| recorder.frames_presented() > paused_at).await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_clear_and_export_through_handle() {
        let (engine, publisher) = engine(SessionConfig::default());
        let handle = engine.start(crate::render::NullSink);

        assert!(matches!(handle.export_csv(), Err(ExportError::Empty)));
        publisher.publish("1,1,1", SystemTime::now()).unwrap();
        let session = handle.session();
        wait_for(|| lock_session(&session).history().len() == 1).await;
        assert_eq!(handle.export_csv().unwrap().lines().count(), 2);

        handle.clear();
        assert!(lock_session(&session).origin().is_none());
        assert_eq!(handle.stats().clears, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_export_to_dir_writes_captured_snapshot() {
        let (engine, publisher) = engine(SessionConfig::default());
        let handle = engine.start(crate::render::NullSink);
        let dir = std::env::temp_dir().join(format!("locator-engine-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        for i in 0..5 {
            publisher.publish(format!("{i},1,2"), SystemTime::now()).unwrap();
        }
        let session = handle.session();
        wait_for(|| lock_session(&session).history().len() == 5).await;

        let expected = handle.export_csv().unwrap();
        let path = handle.export_to_dir(&dir).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);

        // Lock is free again and ingestion carries on after the export
        assert!(session.try_lock().is_ok());
        publisher.publish("9,9,9", SystemTime::now()).unwrap();
        wait_for(|| lock_session(&session).history().len() == 6).await;

        handle.shutdown().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
