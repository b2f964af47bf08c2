//! Integration tests against a real MQTT broker
//!
//! Ignored by default. Run with a broker listening on `MQTTMS_TEST_BROKER`
//! (host, default `localhost`, port 1883, anonymous or guest/guest):
//!
//! ```bash
//! MQTTMS_TEST_BROKER=localhost cargo test --test test_mqtt_broker_integration -- --ignored
//! ```

use mqttms::config::{MqttSection, MsConfig};
use mqttms::device::MsHost;
use mqttms::dispatcher::MessageDispatcher;
use mqttms::transport::mqtt::MqttClient;
use mqttms::transport::{Publisher, Transport};
use mqttms::MsSession;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::sync::Arc;

fn broker_host() -> String {
    std::env::var("MQTTMS_TEST_BROKER").unwrap_or_else(|_| "localhost".to_string())
}

fn mqtt_section(client_id: &str) -> MqttSection {
    MqttSection {
        host: broker_host(),
        client_id: client_id.to_string(),
        timeout_ms: 3000,
        ..MqttSection::default()
    }
}

/// Slave side: answers every command with OK, echoing its cid
struct EchoSlave {
    server_mac: String,
    publisher: OnceCell<Arc<dyn Publisher>>,
}

impl MessageDispatcher for EchoSlave {
    fn handle_message(&self, _topic: &str, payload: &str) -> bool {
        let Ok(command) = serde_json::from_str::<Value>(payload) else {
            return false;
        };
        let (Some(client), Some(publisher)) = (command["client"].as_str(), self.publisher.get())
        else {
            return false;
        };

        let answer = json!({
            "cid": command["cid"],
            "server": self.server_mac,
            "response": "OK",
            "data": "0102",
        });
        publisher.publish(&format!("@/{client}/RSP/ASCIIHEX"), answer.to_string());
        true
    }
}

#[tokio::test]
#[ignore = "requires a running MQTT broker"]
async fn test_connect_subscribe_and_disconnect() {
    let mut client = MqttClient::new(
        &mqtt_section("mqttms-it-connect"),
        false,
        Arc::new(mqttms::dispatcher::DispatcherChain::new()),
    );

    client.connect().await.expect("Connection should succeed");
    assert!(client.is_connected());

    client
        .subscribe("@/1234567890AB/RSP/+")
        .await
        .expect("Subscription should succeed");
    assert_eq!(client.subscribed_topics().await, vec!["@/1234567890AB/RSP/+"]);

    client.disconnect_and_exit().await;
    assert!(!client.is_connected());
    assert!(client.subscribed_topics().await.is_empty());
}

#[tokio::test]
#[ignore = "requires a running MQTT broker"]
async fn test_round_trip_with_echo_slave() {
    let slave_dispatcher = Arc::new(EchoSlave {
        server_mac: "112233445566".to_string(),
        publisher: OnceCell::new(),
    });
    let mut slave = MqttClient::new(
        &mqtt_section("mqttms-it-slave"),
        false,
        slave_dispatcher.clone(),
    );
    let _ = slave_dispatcher.publisher.set(slave.publisher());
    slave.connect().await.expect("Slave should connect");
    slave
        .subscribe("@/112233445566/CMD/+")
        .await
        .expect("Slave should subscribe");

    let mut config = MsConfig::default();
    config.mqtt = mqtt_section("mqttms-it-master");
    config.ms.timeout_ms = 3000;
    config.ms.strict_cid = true;
    let mut session = MsSession::new(config).unwrap();
    session.start().await.expect("Master should start");

    let response = MsHost::new(session.engine()).who_am_i().await.unwrap();
    assert_eq!(response.response, "OK");
    assert_eq!(response.server, "112233445566");
    assert_eq!(response.data_str(), Some("0102"));

    session.graceful_exit().await;
    slave.disconnect_and_exit().await;
}
