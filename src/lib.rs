//! mqttms - synchronous request/reply over MQTT
//!
//! A master publishes commands to a slave device on
//! `@/<server_mac>/CMD/<FORMAT>` and waits for the answer on
//! `@/<client_mac>/RSP/<FORMAT>`. The crate turns that fire-and-forget
//! exchange into an awaited call:
//!
//! - [`transport`] - MQTT connection, FIFO publish and receive workers
//! - [`dispatcher`] - routing of inbound messages to their consumer
//! - [`protocol`] - command engine, topic templates and response schema
//! - [`session`] - wiring and lifecycle of the pieces above
//! - [`device`] - named helpers for the slave's command codes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqttms::{device::MsHost, MsConfig, MsSession};
//!
//! # tokio_test::block_on(async {
//! let config = MsConfig::from_toml_str(r#"
//! [ms]
//! client_mac = "1234567890AB"
//! server_mac = "AABBCCDDEEFF"
//! "#)?;
//!
//! let mut session = MsSession::new(config)?;
//! session.start().await?;
//!
//! let response = MsHost::new(session.engine()).who_am_i().await?;
//! println!("{response}");
//!
//! session.graceful_exit().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, MsConfig};
pub use error::{MsError, MsResult};
pub use protocol::*;
pub use session::MsSession;
pub use transport::mqtt::MqttClient;
