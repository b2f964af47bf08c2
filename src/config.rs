//! Configuration for the master/slave protocol stack
//!
//! A single TOML file with three sections: `[mqtt]` for the broker connection,
//! `[ms]` for the protocol peers and topics, `[logging]` for payload verbosity.
//! Every field has a default, so a missing section yields a runnable setup.

use crate::protocol::topics::{TemplateError, TopicTemplate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Smallest accepted `long_payload` threshold
pub const MIN_LONG_PAYLOAD: usize = 10;

/// Largest accepted `long_payload` threshold
pub const MAX_LONG_PAYLOAD: usize = 32768;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MsConfig {
    pub mqtt: MqttSection,
    pub ms: MsSection,
    pub logging: LoggingSection,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    /// Connection acknowledgment timeout in milliseconds
    pub timeout_ms: u64,
    /// Subscription acknowledgment timeout; falls back to `timeout_ms`
    pub subscribe_timeout_ms: Option<u64>,
    /// Upper bound on waiting for a single publish acknowledgment
    pub publish_ack_timeout_ms: u64,
    pub keep_alive_secs: u64,
    /// Publish QoS for commands, 0 or 1
    pub qos: u8,
    /// Payloads longer than this are logged as `<long payload>` unless verbose
    pub long_payload: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_credential() -> String {
    "guest".to_string()
}

fn default_client_id() -> String {
    "mqttx_93919c20".to_string()
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 1883,
            username: default_credential(),
            password: default_credential(),
            client_id: default_client_id(),
            timeout_ms: 15000,
            subscribe_timeout_ms: None,
            publish_ack_timeout_ms: 5000,
            keep_alive_secs: 60,
            qos: 0,
            long_payload: 25,
        }
    }
}

impl MqttSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms.unwrap_or(self.timeout_ms))
    }

    pub fn publish_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_ack_timeout_ms)
    }

    /// Credentials are only sent when both parts are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }
}

/// Protocol peers and topic templates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MsSection {
    /// This master's address
    pub client_mac: String,
    /// The slave's address
    pub server_mac: String,
    pub cmd_topic: String,
    pub rsp_topic: String,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
    /// Reject responses whose `cid` differs from the command's
    pub strict_cid: bool,
}

impl Default for MsSection {
    fn default() -> Self {
        Self {
            client_mac: "1234567890AB".to_string(),
            server_mac: "112233445566".to_string(),
            cmd_topic: "@/server_mac/CMD/format".to_string(),
            rsp_topic: "@/client_mac/RSP/format".to_string(),
            timeout_ms: 5000,
            strict_cid: false,
        }
    }
}

impl MsSection {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn command_template(&self) -> Result<TopicTemplate, TemplateError> {
        TopicTemplate::command(&self.cmd_topic)
    }

    pub fn response_template(&self) -> Result<TopicTemplate, TemplateError> {
        TopicTemplate::response(&self.rsp_topic)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub verbose: bool,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid {field} '{value}': expected 12 hexadecimal characters")]
    InvalidMac { field: &'static str, value: String },
    #[error("Invalid topic template: {0}")]
    Template(#[from] TemplateError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MsConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mac("ms.client_mac", &self.ms.client_mac)?;
        validate_mac("ms.server_mac", &self.ms.server_mac)?;

        if self.mqtt.host.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.host must not be empty".to_string(),
            ));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.port must be between 1 and 65535".to_string(),
            ));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.client_id must not be empty".to_string(),
            ));
        }
        if !(MIN_LONG_PAYLOAD..=MAX_LONG_PAYLOAD).contains(&self.mqtt.long_payload) {
            return Err(ConfigError::InvalidConfig(format!(
                "mqtt.long_payload must be between {MIN_LONG_PAYLOAD} and {MAX_LONG_PAYLOAD}, got {}",
                self.mqtt.long_payload
            )));
        }
        if self.mqtt.qos > 1 {
            return Err(ConfigError::InvalidConfig(format!(
                "mqtt.qos must be 0 or 1, got {}",
                self.mqtt.qos
            )));
        }

        let timeouts = [
            ("mqtt.timeout_ms", self.mqtt.timeout_ms),
            ("mqtt.publish_ack_timeout_ms", self.mqtt.publish_ack_timeout_ms),
            ("ms.timeout_ms", self.ms.timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if self.mqtt.subscribe_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "mqtt.subscribe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.ms.command_template()?;
        self.ms.response_template()?;

        Ok(())
    }

    /// Short-timeout configuration for unit tests
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
host = "localhost"
port = 1883
client_id = "mqttms-test"
timeout_ms = 500

[ms]
client_mac = "1234567890AB"
server_mac = "112233445566"
timeout_ms = 200
"#;
        Self::from_toml_str(toml_content).expect("Test config should parse")
    }
}

/// Peer addresses are exactly 12 hexadecimal characters
fn validate_mac(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() == 12 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidMac {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MsConfig::from_toml_str("").unwrap();
        assert_eq!(config, MsConfig::default());
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id, "mqttx_93919c20");
        assert_eq!(config.mqtt.long_payload, 25);
        assert_eq!(config.ms.cmd_topic, "@/server_mac/CMD/format");
        assert_eq!(config.ms.rsp_topic, "@/client_mac/RSP/format");
        assert_eq!(config.ms.response_timeout(), Duration::from_secs(5));
        assert!(!config.ms.strict_cid);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[mqtt]
host = "broker.local"
port = 8883
username = "master"
password = "s3cret"
client_id = "bench-01"
timeout_ms = 3000
subscribe_timeout_ms = 1000
publish_ack_timeout_ms = 250
keep_alive_secs = 30
qos = 1
long_payload = 64

[ms]
client_mac = "AABBCCDDEEFF"
server_mac = "001122334455"
cmd_topic = "@/server_mac/CMD/format"
rsp_topic = "@/client_mac/RSP/format"
timeout_ms = 750
strict_cid = true

[logging]
verbose = true
"#;
        let config = MsConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.credentials(), Some(("master", "s3cret")));
        assert_eq!(config.mqtt.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.mqtt.subscribe_timeout(), Duration::from_secs(1));
        assert_eq!(config.mqtt.publish_ack_timeout(), Duration::from_millis(250));
        assert_eq!(config.mqtt.qos, 1);
        assert_eq!(config.ms.client_mac, "AABBCCDDEEFF");
        assert_eq!(config.ms.response_timeout(), Duration::from_millis(750));
        assert!(config.ms.strict_cid);
        assert!(config.logging.verbose);
    }

    #[test]
    fn test_subscribe_timeout_falls_back_to_connect_timeout() {
        let config = MsConfig::test_config();
        assert_eq!(config.mqtt.subscribe_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut section = MqttSection::default();
        section.password.clear();
        assert_eq!(section.credentials(), None);
    }

    #[test]
    fn test_invalid_macs() {
        for bad in ["12345", "1234567890AG", "1234567890ABC", ""] {
            let mut config = MsConfig::default();
            config.ms.server_mac = bad.to_string();
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::InvalidMac { field: "ms.server_mac", .. })
                ),
                "{bad} should be rejected"
            );
        }

        let mut config = MsConfig::default();
        config.ms.client_mac = "aabbccddeeff".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_long_payload_range() {
        let mut config = MsConfig::default();
        config.mqtt.long_payload = 9;
        assert!(config.validate().is_err());
        config.mqtt.long_payload = 10;
        assert!(config.validate().is_ok());
        config.mqtt.long_payload = 32768;
        assert!(config.validate().is_ok());
        config.mqtt.long_payload = 32769;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_numeric_fields() {
        let mut config = MsConfig::default();
        config.mqtt.port = 0;
        assert!(config.validate().is_err());

        let mut config = MsConfig::default();
        config.mqtt.qos = 2;
        assert!(config.validate().is_err());

        let mut config = MsConfig::default();
        config.ms.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = MsConfig::default();
        config.mqtt.subscribe_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_templates() {
        let mut config = MsConfig::default();
        config.ms.cmd_topic = "@/server_mac/format".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Template(_))));

        let mut config = MsConfig::default();
        config.ms.rsp_topic = "@/server_mac/RSP/format".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Template(_))));
    }

    #[test]
    fn test_unknown_toml_is_a_parse_error() {
        let result = MsConfig::from_toml_str("[mqtt]\nport = \"not a number\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }
}
