//! Sample transport abstraction (the publish/subscribe collaborator).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::InboundMessage;

/// Connection lifecycle flags reflected to the UI.
///
/// The engine only observes these; connect/reconnect policy belongs to the
/// transport implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportState {
    /// Link to the broker/source is up
    pub connected: bool,

    /// Subscription to the sample topic is active
    pub subscribed: bool,
}

impl TransportState {
    /// Both connected and subscribed.
    pub fn live() -> Self {
        Self {
            connected: true,
            subscribed: true,
        }
    }

    /// Whether samples can currently flow.
    pub fn is_live(&self) -> bool {
        self.connected && self.subscribed
    }
}

/// Abstraction for the source of coordinate messages.
///
/// # Implementations
///
/// - **Production**: wraps a broker client (MQTT, ZMQ, ...) outside this workspace
/// - **Channel**: `ChannelTransport`, fed by any producer holding a `ChannelPublisher`
/// - **Simulation**: the same channel transport driven by a fault-injecting feed
///
/// # Message Flow
///
/// ```text
/// Producer                 Transport                  Engine
///   |                          |                         |
///   |-- publish(payload) ----->|                         |
///   |                          |-- [queue, unbounded] -->|
///   |                          |                         |-- recv() -> message
/// ```
#[async_trait]
pub trait SampleTransport: Send + Sync + 'static {
    /// Receives the next message.
    ///
    /// # Returns
    /// * `Some(message)` - A message was delivered
    /// * `None` - The transport was closed (shutdown)
    ///
    /// # Blocking
    /// Waits until a message arrives or the transport closes. An arbitrarily
    /// long gap between messages is normal.
    async fn recv(&self) -> Option<InboundMessage>;

    /// Returns the current connection lifecycle state.
    fn state(&self) -> TransportState;

    /// Releases the subscription. After this, `recv` drains and returns `None`.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_live() {
        assert!(TransportState::live().is_live());
        assert!(!TransportState::default().is_live());

        let half = TransportState {
            connected: true,
            subscribed: false,
        };
        assert!(!half.is_live());
    }
}
