//! MQTT transport for the master side of the protocol
//!
//! Pure decision logic is kept apart from the I/O so it can be tested
//! without a broker:
//!
//! - [`connection`] - connection states, errors and broker options
//! - [`message_handler`] - routing of rumqttc events
//! - [`health_monitor`] - state transitions and reconnection decisions
//! - [`pending`] - packet-id bookkeeping for outstanding requests
//! - [`signal`] - one-shot handshake flags
//! - [`client`] - the network loop, the workers and the public client
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqttms::config::MqttSection;
//! use mqttms::dispatcher::DispatcherChain;
//! use mqttms::transport::mqtt::MqttClient;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection::default();
//! let mut client = MqttClient::new(&config, false, Arc::new(DispatcherChain::new()));
//! client.connect().await?;
//! client.subscribe("@/1234567890AB/RSP/+").await?;
//! client.disconnect_and_exit().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;
pub mod pending;
pub mod signal;

pub use client::{MqttClient, MqttPublisher};
pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
pub use pending::{Assignment, PendingAcks, Ticket};
pub use signal::Signal;
