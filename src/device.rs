//! Device command façade
//!
//! Named helpers for the slave's fixed command codes. Each one sends
//! `{"command":<code>,"data":""}` and returns the slave's [`Response`],
//! which may be a synthesized `TM` or `BD`.

use crate::protocol::{command_payload, ProtocolEngine, ProtocolError, Response};
use tracing::info;

/// Who-am-I
pub const CMD_WHO_AM_I: &str = "WH";
/// No operation
pub const CMD_NOP: &str = "NP";
/// Sensor readings
pub const CMD_SENSORS: &str = "SR";
/// MAC address of the slave
pub const CMD_GET_MAC: &str = "GM";
/// Parameter dump
pub const CMD_GET_PARAMS: &str = "PG";
/// Start ventilation
pub const CMD_START_VENT: &str = "SV";
/// MQTT readiness
pub const CMD_MQTT_READY: &str = "MQ";

pub struct MsHost<'a> {
    engine: &'a ProtocolEngine,
}

impl<'a> MsHost<'a> {
    pub fn new(engine: &'a ProtocolEngine) -> Self {
        Self { engine }
    }

    /// Send a command code with empty data
    pub async fn simple_command(&self, code: &str) -> Result<Response, ProtocolError> {
        self.command(code, "").await
    }

    /// Send a command code with `data`
    pub async fn command(&self, code: &str, data: &str) -> Result<Response, ProtocolError> {
        let response = self.engine.submit_command(command_payload(code, data)).await?;
        info!("MS: {} -> {}", code, response);
        Ok(response)
    }

    pub async fn who_am_i(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_WHO_AM_I).await
    }

    pub async fn nop(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_NOP).await
    }

    pub async fn sensors(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_SENSORS).await
    }

    pub async fn get_mac(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_GET_MAC).await
    }

    pub async fn get_params(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_GET_PARAMS).await
    }

    pub async fn start_vent(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_START_VENT).await
    }

    pub async fn mqtt_ready(&self) -> Result<Response, ProtocolError> {
        self.simple_command(CMD_MQTT_READY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MsConfig;
    use crate::protocol::{response_channel, EngineSettings};
    use crate::session::response_dispatcher;
    use crate::testing::{ok_responder, MockPublisher};
    use std::sync::Arc;
    use std::time::Duration;

    fn looped_engine() -> (ProtocolEngine, Arc<MockPublisher>) {
        let config = MsConfig::test_config();
        let (tx, rx) = response_channel();
        let publisher = Arc::new(MockPublisher::with_responder(
            response_dispatcher(&config, tx).unwrap(),
            Duration::from_millis(5),
            ok_responder(&config.ms.server_mac, "01"),
        ));
        let settings = EngineSettings::from_section(&config.ms).unwrap();
        let engine = ProtocolEngine::start(settings, publisher.clone(), rx).unwrap();
        (engine, publisher)
    }

    #[tokio::test]
    async fn test_helpers_send_their_codes() {
        let (engine, publisher) = looped_engine();
        let host = MsHost::new(&engine);

        host.who_am_i().await.unwrap();
        host.nop().await.unwrap();
        host.sensors().await.unwrap();
        host.get_mac().await.unwrap();
        host.get_params().await.unwrap();
        host.start_vent().await.unwrap();
        host.mqtt_ready().await.unwrap();

        let codes: Vec<String> = publisher
            .published()
            .iter()
            .map(|message| message.json()["command"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["WH", "NP", "SR", "GM", "PG", "SV", "MQ"]);

        for message in publisher.published() {
            assert_eq!(message.topic, "@/112233445566/CMD/ASCIIHEX");
            assert_eq!(message.json()["data"], "");
            assert_eq!(message.json()["client"], "1234567890AB");
        }

        engine.graceful_exit().await;
    }

    #[tokio::test]
    async fn test_simple_command_returns_slave_answer() {
        let (engine, _publisher) = looped_engine();
        let host = MsHost::new(&engine);

        let response = host.simple_command("WH").await.unwrap();
        assert_eq!(response.response, "OK");
        assert_eq!(response.server, "112233445566");
        assert_eq!(response.data_str(), Some("01"));

        engine.graceful_exit().await;
    }
}
