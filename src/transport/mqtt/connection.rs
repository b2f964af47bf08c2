//! Pure connection state management for the MQTT transport
//!
//! This module contains connection state, reconnection policy, transport
//! errors and broker option construction. Nothing here performs I/O.

use crate::config::MqttSection;
use rumqttc::v5::{mqttbytes::QoS, ClientError, MqttOptions};
use std::time::Duration;
use thiserror::Error;

/// Largest packet accepted from or sent to the broker
pub const MAX_PACKET_SIZE: u32 = 256 * 1024;

/// Connection state for the MQTT transport
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Waiting for the broker's ConnAck
    Connecting,
    /// ConnAck received, ready for operations
    Connected,
    /// Disconnected with reason
    Disconnected(String),
    /// Attempting to reconnect (attempt count)
    Reconnecting(u32),
    /// Reconnection given up or connection closed for good
    PermanentlyDisconnected(String),
}

/// Reconnection policy for unsolicited disconnects
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Delay before each attempt in milliseconds
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        // A single attempt; anything more belongs to the caller
        Self {
            max_attempts: Some(1),
            delay_ms: 250,
        }
    }
}

impl ReconnectConfig {
    pub fn delay_for_attempt(&self, _attempt: u32) -> u64 {
        self.delay_ms
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No connection acknowledgment within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Subscription to '{topic}' failed: {reason}")]
    SubscriptionFailed { topic: String, reason: String },
    #[error("No subscription acknowledgment for '{topic}' within {timeout:?}")]
    SubscribeTimeout { topic: String, timeout: Duration },
    #[error("No unsubscribe acknowledgment for '{topic}' within {timeout:?}")]
    UnsubscribeTimeout { topic: String, timeout: Duration },
    #[error("MQTT client request failed: {0}")]
    Client(#[from] ClientError),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Event loop already started")]
    AlreadyStarted,
}

/// Build broker options from the `[mqtt]` section (pure function)
pub fn configure_mqtt_options(config: &MqttSection) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);

    if let Some((username, password)) = config.credentials() {
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_max_packet_size(Some(MAX_PACKET_SIZE));

    mqtt_options
}

/// Map the configured publish QoS level (0 or 1)
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default_is_single_attempt() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, Some(1));
        assert_eq!(config.delay_for_attempt(1), 250);
    }

    #[test]
    fn test_configure_mqtt_options() {
        let section = MqttSection {
            host: "broker.local".to_string(),
            port: 1884,
            client_id: "bench-01".to_string(),
            keep_alive_secs: 30,
            ..MqttSection::default()
        };

        let options = configure_mqtt_options(&section);
        assert_eq!(options.client_id(), "bench-01");
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn test_qos_from_level() {
        assert_eq!(qos_from_level(0), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1), QoS::AtLeastOnce);
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("test".to_string())
        );
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("refused".to_string()),
            MqttError::ConnectTimeout(Duration::from_secs(1)),
            MqttError::SubscriptionFailed {
                topic: "@/x/RSP/+".to_string(),
                reason: "NotAuthorized".to_string(),
            },
            MqttError::SubscribeTimeout {
                topic: "@/x/RSP/+".to_string(),
                timeout: Duration::from_secs(1),
            },
            MqttError::UnsubscribeTimeout {
                topic: "@/x/RSP/+".to_string(),
                timeout: Duration::from_secs(1),
            },
            MqttError::NotConnected {
                state: ConnectionState::Connecting,
            },
            MqttError::AlreadyStarted,
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
