//! Channel-backed sample transport.
//!
//! Any producer (a broker bridge, the simulator, a stdin reader) pushes
//! messages through a `ChannelPublisher`; the engine consumes them through
//! the `SampleTransport` half. The queue is unbounded: the engine never
//! exerts backpressure on the source.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::EnvError;
use crate::transport::{SampleTransport, TransportState};
use crate::types::InboundMessage;

/// Lifecycle flags shared between both halves.
#[derive(Debug, Default)]
struct SharedState {
    connected: AtomicBool,
    subscribed: AtomicBool,
}

impl SharedState {
    fn snapshot(&self) -> TransportState {
        TransportState {
            connected: self.connected.load(Ordering::Acquire),
            subscribed: self.subscribed.load(Ordering::Acquire),
        }
    }
}

/// Consumer half, handed to the engine.
pub struct ChannelTransport {
    topic: String,
    rx: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    state: Arc<SharedState>,
    closed: Arc<watch::Sender<bool>>,
}

/// Producer half, kept by whoever delivers samples.
#[derive(Clone)]
pub struct ChannelPublisher {
    topic: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
    state: Arc<SharedState>,
    closed: Arc<watch::Sender<bool>>,
}

impl ChannelTransport {
    /// Creates a connected pair for the given topic.
    ///
    /// The transport starts disconnected; the publisher reports
    /// `connect`/`subscribe` the way a broker client would.
    pub fn pair(topic: impl Into<String>) -> (ChannelTransport, ChannelPublisher) {
        let topic = topic.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState::default());
        let (closed, _) = watch::channel(false);
        let closed = Arc::new(closed);

        let transport = ChannelTransport {
            topic: topic.clone(),
            rx: Mutex::new(rx),
            state: Arc::clone(&state),
            closed: Arc::clone(&closed),
        };
        let publisher = ChannelPublisher {
            topic,
            tx,
            state,
            closed,
        };
        (transport, publisher)
    }

    /// Topic this transport is subscribed to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Takes the next queued message without waiting.
    ///
    /// Returns `None` when the queue is empty, the transport is closed, or
    /// another task is currently inside `recv`. Used by step-driven
    /// simulation where no executor is polling `recv`.
    pub fn try_recv(&self) -> Option<InboundMessage> {
        if self.is_closed() {
            return None;
        }
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl SampleTransport for ChannelTransport {
    async fn recv(&self) -> Option<InboundMessage> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow_and_update() {
            return None;
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = closed_rx.changed() => None,
            msg = rx.recv() => msg,
        }
    }

    fn state(&self) -> TransportState {
        self.state.snapshot()
    }

    fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.state.connected.store(false, Ordering::Release);
        self.state.subscribed.store(false, Ordering::Release);
        self.closed.send_replace(true);
        tracing::info!(topic = %self.topic, "transport closed");
    }
}

impl ChannelPublisher {
    /// Marks the link as connected and the topic as subscribed.
    pub fn connect(&self) {
        self.state.connected.store(true, Ordering::Release);
        self.state.subscribed.store(true, Ordering::Release);
        tracing::info!(topic = %self.topic, "subscribed");
    }

    /// Reflects a reconnect/offline transition (subscription is kept).
    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::Release);
    }

    /// Reflects a dropped connection: both flags go false.
    pub fn disconnect(&self) {
        self.state.connected.store(false, Ordering::Release);
        self.state.subscribed.store(false, Ordering::Release);
    }

    /// Delivers a payload stamped with `received_at`.
    ///
    /// # Returns
    /// * `Ok(())` - Message queued
    /// * `Err(EnvError::TransportClosed)` - The consumer closed or went away
    pub fn publish(&self, payload: impl Into<Vec<u8>>, received_at: SystemTime) -> Result<(), EnvError> {
        if *self.closed.borrow() {
            return Err(EnvError::TransportClosed);
        }
        let msg = InboundMessage::new(self.topic.clone(), payload, received_at);
        self.tx.send(msg).map_err(|_| EnvError::TransportClosed)
    }

    /// Current lifecycle state as seen by the consumer.
    pub fn state(&self) -> TransportState {
        self.state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_then_recv() {
        let (transport, publisher) = ChannelTransport::pair("locator/pos");
        publisher.connect();
        assert!(transport.state().is_live());

        publisher.publish("1,2,3", SystemTime::UNIX_EPOCH).unwrap();
        let msg = transport.recv().await.unwrap();
        assert_eq!(msg.topic, "locator/pos");
        assert_eq!(msg.text(), "1,2,3");
    }

    #[tokio::test]
    async fn test_close_wakes_pending_recv() {
        let (transport, _publisher) = ChannelTransport::pair("locator/pos");
        let transport = Arc::new(transport);

        let waiter = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.close();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
        assert_eq!(transport.state(), TransportState::default());
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let (transport, publisher) = ChannelTransport::pair("locator/pos");
        publisher.connect();
        transport.close();

        let err = publisher.publish("1,2,3", SystemTime::UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, EnvError::TransportClosed));
        assert!(transport.recv().await.is_none());
    }

    #[test]
    fn test_try_recv_drains_queue() {
        let (transport, publisher) = ChannelTransport::pair("locator/pos");
        assert!(transport.try_recv().is_none());

        publisher.publish("1,2,3", SystemTime::UNIX_EPOCH).unwrap();
        publisher.publish("4,5,6", SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(transport.try_recv().unwrap().text(), "1,2,3");
        assert_eq!(transport.try_recv().unwrap().text(), "4,5,6");
        assert!(transport.try_recv().is_none());

        publisher.publish("7,8,9", SystemTime::UNIX_EPOCH).unwrap();
        transport.close();
        assert!(transport.try_recv().is_none());
    }

    #[test]
    fn test_reconnect_keeps_subscription() {
        let (transport, publisher) = ChannelTransport::pair("locator/pos");
        publisher.connect();
        publisher.set_connected(false);

        let state = transport.state();
        assert!(!state.connected);
        assert!(state.subscribed);

        publisher.disconnect();
        assert!(!transport.state().subscribed);
    }
}
