//! Transport layer for master/slave communication
//!
//! This module provides the transport abstraction and its MQTT implementation.
//! The protocol engine only ever sees a [`Publisher`]; sessions drive the
//! full [`Transport`] lifecycle.

use std::sync::Arc;

pub mod mqtt;

pub use mqtt::ConnectionState;

/// Fire-and-forget outbound path
///
/// `publish` enqueues and returns immediately; delivery happens on the
/// transport's own publish worker in FIFO order.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: String);
}

/// Transport trait for the master side of the protocol
///
/// This trait provides an abstraction over the broker connection to enable
/// dependency injection and testing.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect and wait for the broker's acknowledgment
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Subscribe and wait for the broker's acknowledgment
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Unsubscribe and wait (bounded) for the broker's acknowledgment
    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Unsubscribe everything, stop the workers, then close the connection
    ///
    /// Best effort: failures are logged and the shutdown continues.
    async fn disconnect_and_exit(&mut self);

    /// Stop the publish and receive workers without touching the connection
    async fn exit_workers(&mut self);

    /// Handle for enqueueing outbound messages
    fn publisher(&self) -> Arc<dyn Publisher>;

    /// Current connection state, `None` before `connect`
    fn connection_state(&self) -> Option<ConnectionState>;

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;
