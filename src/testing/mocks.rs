//! Mock implementations for testing
//!
//! Provides a mock [`Publisher`] and a mock [`Transport`] so the protocol
//! engine and the session can be exercised without a broker.

use crate::dispatcher::MessageDispatcher;
use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{Publisher, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One recorded call to [`Publisher::publish`]
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub at: Instant,
}

impl PublishedMessage {
    /// Payload parsed as JSON, `Null` if it is not JSON
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.payload).unwrap_or(Value::Null)
    }
}

/// Computes the slave's answer `(topic, payload)` for a published command
pub type Responder = Box<dyn Fn(&str, &str) -> Option<(String, String)> + Send + Sync>;

struct Loopback {
    responder: Responder,
    dispatcher: Arc<dyn MessageDispatcher>,
    delay: Duration,
}

/// Mock publisher that records messages and can play the slave
#[derive(Default)]
pub struct MockPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    loopback: Option<Loopback>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer each publish through `dispatcher` after `delay`
    ///
    /// With a non-zero delay the answer is delivered from a spawned task, so
    /// publishing must happen inside a Tokio runtime.
    pub fn with_responder(
        dispatcher: Arc<dyn MessageDispatcher>,
        delay: Duration,
        responder: Responder,
    ) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            loopback: Some(Loopback {
                responder,
                dispatcher,
                delay,
            }),
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn clear_history(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }
}

impl Publisher for MockPublisher {
    fn publish(&self, topic: &str, payload: String) {
        if let Some(loopback) = &self.loopback {
            if let Some((rsp_topic, rsp_payload)) = (loopback.responder)(topic, &payload) {
                let dispatcher = loopback.dispatcher.clone();
                if loopback.delay.is_zero() {
                    dispatcher.handle_message(&rsp_topic, &rsp_payload);
                } else {
                    let delay = loopback.delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        dispatcher.handle_message(&rsp_topic, &rsp_payload);
                    });
                }
            }
        }

        if let Ok(mut published) = self.published.lock() {
            published.push(PublishedMessage {
                topic: topic.to_string(),
                payload,
                at: Instant::now(),
            });
        }
    }
}

/// Responder answering every command with status `OK`
///
/// The answer echoes the command's `cid`, goes to
/// `@/<client>/RSP/ASCIIHEX` and carries `data`.
pub fn ok_responder(server_mac: &str, data: &str) -> Responder {
    let server_mac = server_mac.to_string();
    let data = data.to_string();
    Box::new(move |_topic, payload| {
        let command: Value = serde_json::from_str(payload).ok()?;
        let client = command.get("client")?.as_str()?.to_string();
        let answer = json!({
            "cid": command.get("cid")?.clone(),
            "server": server_mac,
            "response": "OK",
            "dataType": "asciihex",
            "data": data,
        });
        Some((format!("@/{client}/RSP/ASCIIHEX"), answer.to_string()))
    })
}

/// Mock transport for testing
pub struct MockTransport {
    publisher: Arc<MockPublisher>,
    state: Option<ConnectionState>,
    subscriptions: Vec<String>,
    calls: Vec<&'static str>,
    fail_connect: bool,
    fail_subscribe: bool,
}

impl MockTransport {
    pub fn new(publisher: Arc<MockPublisher>) -> Self {
        Self {
            publisher,
            state: None,
            subscriptions: Vec::new(),
            calls: Vec::new(),
            fail_connect: false,
            fail_subscribe: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn mock_publisher(&self) -> Arc<MockPublisher> {
        self.publisher.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.clone()
    }

    /// Lifecycle calls received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.calls.push("connect");
        if self.fail_connect {
            self.state = Some(ConnectionState::Disconnected(
                "Mock connection refused".to_string(),
            ));
            return Err(MqttError::ConnectionFailed(
                "Mock connection refused".to_string(),
            ));
        }
        self.state = Some(ConnectionState::Connected);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.calls.push("subscribe");
        if !self.is_connected() {
            return Err(MqttError::NotConnected {
                state: self.state.clone().unwrap_or(ConnectionState::Connecting),
            });
        }
        if self.fail_subscribe {
            return Err(MqttError::SubscribeTimeout {
                topic: topic.to_string(),
                timeout: Duration::from_millis(0),
            });
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.calls.push("unsubscribe");
        self.subscriptions.retain(|t| t != topic);
        Ok(())
    }

    async fn disconnect_and_exit(&mut self) {
        self.calls.push("disconnect_and_exit");
        self.subscriptions.clear();
        self.state = Some(ConnectionState::PermanentlyDisconnected(
            "Client disconnected".to_string(),
        ));
    }

    async fn exit_workers(&mut self) {
        self.calls.push("exit_workers");
    }

    fn publisher(&self) -> Arc<dyn Publisher> {
        self.publisher.clone()
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ResponseDispatcher;
    use crate::protocol::{response_channel, TopicTemplate};

    #[tokio::test]
    async fn test_mock_transport_lifecycle() {
        let mut transport = MockTransport::new(Arc::new(MockPublisher::new()));
        assert_eq!(transport.connection_state(), None);
        assert!(transport.subscribe("a/b/c/+").await.is_err());

        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        transport.subscribe("a/b/c/+").await.unwrap();
        assert_eq!(transport.subscriptions(), vec!["a/b/c/+".to_string()]);

        transport.disconnect_and_exit().await;
        assert!(!transport.is_connected());
        assert!(transport.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_ok_responder_loops_back_through_dispatcher() {
        let (tx, mut rx) = response_channel();
        let template = TopicTemplate::response("@/client_mac/RSP/format").unwrap();
        let dispatcher = Arc::new(ResponseDispatcher::new(&template, "1234567890AB", tx).unwrap());

        let publisher = MockPublisher::with_responder(
            dispatcher,
            Duration::ZERO,
            ok_responder("112233445566", "01"),
        );
        publisher.publish(
            "@/112233445566/CMD/ASCIIHEX",
            r#"{"cid":7,"client":"1234567890AB","command":"WH","data":""}"#.to_string(),
        );

        let inbound = rx.try_recv().unwrap();
        assert_eq!(inbound.topic, "@/1234567890AB/RSP/ASCIIHEX");
        let answer: Value = serde_json::from_str(&inbound.payload).unwrap();
        assert_eq!(answer["cid"], 7);
        assert_eq!(answer["response"], "OK");
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(publisher.published()[0].json()["command"], "WH");
    }
}
