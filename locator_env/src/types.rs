//! Common types for the Locator environment abstraction.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Unique identifier for a visualization session.
///
/// Uses UUID v4 so concurrent sessions (e.g. in tests) never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic SessionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A single message delivered by the transport collaborator.
///
/// The payload is opaque bytes; interpreting it as a coordinate sample is
/// the core's job, not the transport's.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message arrived on
    pub topic: String,

    /// Raw message bytes
    pub payload: Vec<u8>,

    /// Time the transport handed the message over
    pub received_at: SystemTime,
}

impl InboundMessage {
    /// Creates a new message from payload bytes.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, received_at: SystemTime) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }

    /// Returns the payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
