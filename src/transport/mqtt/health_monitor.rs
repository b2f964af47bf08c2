//! Pure reconnection and state transition logic for the MQTT transport
//!
//! The network loop feeds connection events through these functions and acts
//! on the decisions they return.

use super::connection::{ConnectionState, ReconnectConfig};
use tracing::{error, info, warn};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Decide whether to try again after losing the connection (pure function)
    ///
    /// A connection that never got its first ConnAck is a failed `connect`,
    /// not a lost connection, and is never retried here.
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        ever_connected: bool,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if !ever_connected {
            return ReconnectionDecision::AbortNeverConnected;
        }

        if let Some(max_attempts) = config.max_attempts {
            if current_attempts >= max_attempts {
                return ReconnectionDecision::AbortMaxAttemptsExceeded;
            }
        }

        let attempt = current_attempts + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.delay_for_attempt(attempt),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::ConnectionRefused(code) => {
                ConnectionState::Disconnected(format!("Connection refused: {code}"))
            }
            ConnectionEvent::DisconnectedByBroker(reason) => {
                ConnectionState::Disconnected(format!("Broker disconnected: {reason}"))
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::PermanentFailure(reason) => {
                ConnectionState::PermanentlyDisconnected(reason)
            }
            ConnectionEvent::ClientDisconnected => {
                ConnectionState::PermanentlyDisconnected("Client disconnected".to_string())
            }
        }
    }

    /// Check if connection state allows subscribing (pure function)
    pub fn can_subscribe(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Log connection state transition
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("MQTT connected to broker");
            }
            (ConnectionState::Reconnecting(_), ConnectionState::Connected) => {
                info!("MQTT reconnected to broker");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!("Unexpected disconnection from MQTT broker: {}", reason);
            }
            (_, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection failed: {}", reason);
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!("MQTT reconnection attempt {}", attempt);
            }
            (_, ConnectionState::PermanentlyDisconnected(reason)) => {
                error!("MQTT connection closed: {}", reason);
            }
            _ => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - the initial connect never succeeded
    AbortNeverConnected,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Successful ConnAck received from broker
    ConnAckReceived,
    /// ConnAck carried a failure reason code
    ConnectionRefused(String),
    /// Broker sent a Disconnect packet
    DisconnectedByBroker(String),
    /// Network or protocol error from the event loop
    NetworkError(String),
    /// Reconnection attempt started
    ReconnectionStarted(u32),
    /// Permanent failure - no more retries
    PermanentFailure(String),
    /// Orderly disconnect requested by this side
    ClientDisconnected,
}
