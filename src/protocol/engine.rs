//! Serialized command/response exchange over a publish/subscribe transport
//!
//! One worker task owns the whole exchange: it takes commands in submission
//! order, publishes each one, and waits for the next response the dispatcher
//! forwards (or the timeout) before touching the next command. Every
//! submitted command resolves to exactly one [`Response`]; protocol failures
//! become synthesized `TM`/`BD` responses, never errors.

use super::messages::{
    add_tracking_information, data_type_for_topic, parse_command, CommandPayload, Format,
    MessageError, Response, MAX_CID,
};
use super::schema::{ResponseValidator, SchemaError};
use super::topics::{TemplateError, TopicTemplate};
use crate::config::MsSection;
use crate::exchange_span;
use crate::transport::Publisher;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// A response message as delivered by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    pub topic: String,
    pub payload: String,
}

pub type ResponseSender = mpsc::UnboundedSender<InboundResponse>;
pub type ResponseReceiver = mpsc::UnboundedReceiver<InboundResponse>;

/// Channel from the dispatcher into the engine
pub fn response_channel() -> (ResponseSender, ResponseReceiver) {
    mpsc::unbounded_channel()
}

/// Fixed per-engine settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub client_mac: String,
    pub server_mac: String,
    pub command_topic: TopicTemplate,
    pub response_timeout: Duration,
    pub strict_cid: bool,
}

impl EngineSettings {
    pub fn from_section(section: &MsSection) -> Result<Self, TemplateError> {
        Ok(Self {
            client_mac: section.client_mac.clone(),
            server_mac: section.server_mac.clone(),
            command_topic: section.command_template()?,
            response_timeout: section.response_timeout(),
            strict_cid: section.strict_cid,
        })
    }

    /// Topic commands are published on
    pub fn command_topic(&self) -> String {
        self.command_topic.render(&self.server_mac, Format::AsciiHex)
    }
}

/// Protocol engine errors
///
/// Only misuse and a stopped engine are errors; timeouts and bad responses
/// are reported as `TM`/`BD` responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Protocol engine has stopped")]
    EngineStopped,
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] MessageError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

enum EngineCommand {
    Submit {
        payload: CommandPayload,
        reply: oneshot::Sender<Response>,
    },
    Shutdown,
}

/// Handle to the command worker
pub struct ProtocolEngine {
    commands: mpsc::UnboundedSender<EngineCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    server_mac: String,
}

impl ProtocolEngine {
    /// Spawn the command worker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        settings: EngineSettings,
        publisher: Arc<dyn Publisher>,
        responses: ResponseReceiver,
    ) -> Result<Self, ProtocolError> {
        let validator = ResponseValidator::new()?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let server_mac = settings.server_mac.clone();

        let worker = CommandWorker {
            settings,
            publisher,
            responses,
            validator,
        };
        let handle = tokio::spawn(worker.run(command_rx));

        Ok(Self {
            commands,
            worker: Mutex::new(Some(handle)),
            server_mac,
        })
    }

    /// Publish a command and wait for its response
    ///
    /// Commands from concurrent callers are queued and run one at a time in
    /// submission order.
    pub async fn submit_command(&self, payload: CommandPayload) -> Result<Response, ProtocolError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::Submit { payload, reply })
            .map_err(|_| ProtocolError::EngineStopped)?;

        response.await.map_err(|_| ProtocolError::EngineStopped)
    }

    /// Submit a command given as JSON text; it must be a JSON object
    pub async fn submit_json(&self, command: &str) -> Result<Response, ProtocolError> {
        let payload = parse_command(command)?;
        self.submit_command(payload).await
    }

    pub fn server_mac(&self) -> &str {
        &self.server_mac
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stop the worker after the commands already queued
    ///
    /// Idempotent; a command already waiting for its response is not
    /// interrupted.
    pub async fn graceful_exit(&self) {
        let _ = self.commands.send(EngineCommand::Shutdown);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Protocol engine worker ended abnormally: {}", e);
            }
            info!("MS: graceful exited");
        }
    }
}

struct CommandWorker {
    settings: EngineSettings,
    publisher: Arc<dyn Publisher>,
    responses: ResponseReceiver,
    validator: ResponseValidator,
}

impl CommandWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        info!("MS command worker started");

        while let Some(command) = commands.recv().await {
            match command {
                EngineCommand::Submit { payload, reply } => {
                    let cid = generate_cid();
                    let response = self
                        .exchange(cid, payload)
                        .instrument(exchange_span!(cid))
                        .await;
                    if reply.send(response).is_err() {
                        debug!("Caller went away before response for cid {}", cid);
                    }
                }
                EngineCommand::Shutdown => break,
            }
        }

        info!("MS command worker exited");
    }

    async fn exchange(&mut self, cid: u16, payload: CommandPayload) -> Response {
        let tracked = add_tracking_information(payload, cid, &self.settings.client_mac);
        let text = Value::Object(tracked).to_string();

        self.publisher.publish(&self.settings.command_topic(), text);

        match tokio::time::timeout(self.settings.response_timeout, self.responses.recv()).await {
            Ok(Some(inbound)) => evaluate_response(
                &self.validator,
                &self.settings,
                cid,
                &inbound.topic,
                &inbound.payload,
            ),
            Ok(None) => {
                warn!("Response channel closed, no response possible");
                Response::timeout(cid, &self.settings.server_mac)
            }
            Err(_) => {
                info!("MS Timeout");
                Response::timeout(cid, &self.settings.server_mac)
            }
        }
    }
}

/// Uniform correlation id in `0..=MAX_CID`
pub fn generate_cid() -> u16 {
    rand::thread_rng().gen_range(0..=MAX_CID)
}

/// Turn a delivered response into the caller's [`Response`]
///
/// `dataType` always comes from the topic's format token. Anything that
/// cannot be accepted yields a `BD` response carrying `cid`.
pub fn evaluate_response(
    validator: &ResponseValidator,
    settings: &EngineSettings,
    cid: u16,
    topic: &str,
    payload: &str,
) -> Response {
    let bad_data = || Response::bad_data(cid, &settings.server_mac);

    let mut value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            info!("Response is not valid JSON: {}", e);
            return bad_data();
        }
    };

    let Some(data_type) = data_type_for_topic(topic) else {
        info!("Cannot derive data type from topic '{}'", topic);
        return bad_data();
    };

    let Some(object) = value.as_object_mut() else {
        info!("Response is not a JSON object");
        return bad_data();
    };
    object.insert(
        "dataType".to_string(),
        Value::String(data_type.as_str().to_string()),
    );

    if let Err(e) = validator.validate(&value) {
        info!("JSON data is invalid: {}", e);
        return bad_data();
    }
    debug!("JSON validation : OK");

    let response: Response = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(e) => {
            info!("Response does not fit the response record: {}", e);
            return bad_data();
        }
    };

    if settings.strict_cid && response.cid != cid {
        warn!(
            "Response cid {} does not match command cid {}",
            response.cid, cid
        );
        return bad_data();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::DataType;
    use serde_json::json;

    fn settings() -> EngineSettings {
        EngineSettings {
            client_mac: "1234567890AB".to_string(),
            server_mac: "112233445566".to_string(),
            command_topic: TopicTemplate::command("@/server_mac/CMD/format").unwrap(),
            response_timeout: Duration::from_millis(100),
            strict_cid: false,
        }
    }

    fn evaluate(topic: &str, payload: &str) -> Response {
        let validator = ResponseValidator::new().unwrap();
        evaluate_response(&validator, &settings(), 7, topic, payload)
    }

    const OK_PAYLOAD: &str =
        r#"{"cid":7,"server":"112233445566","response":"OK","data":"01","dataType":"asciihex"}"#;

    #[test]
    fn test_generate_cid_in_range() {
        for _ in 0..1000 {
            assert!(generate_cid() <= MAX_CID);
        }
    }

    #[test]
    fn test_command_topic_uses_asciihex() {
        assert_eq!(settings().command_topic(), "@/112233445566/CMD/ASCIIHEX");
    }

    #[test]
    fn test_valid_response_is_returned() {
        let response = evaluate("@/1234567890AB/RSP/ASCIIHEX", OK_PAYLOAD);
        assert_eq!(response.response, "OK");
        assert_eq!(response.cid, 7);
        assert_eq!(response.data, json!("01"));
        assert_eq!(response.data_type, DataType::AsciiHex);
    }

    #[test]
    fn test_data_type_comes_from_topic() {
        let payload = r#"{"cid":7,"server":"112233445566","response":"OK","data":"hello","dataType":"asciihex"}"#;
        let response = evaluate("@/1234567890AB/RSP/ASCII", payload);
        assert_eq!(response.response, "OK");
        assert_eq!(response.data_type, DataType::Ascii);

        // Missing dataType is filled in from the topic
        let payload = r#"{"cid":7,"server":"112233445566","response":"OK","data":{"t":1}}"#;
        let response = evaluate("@/1234567890AB/RSP/JSON", payload);
        assert_eq!(response.data_type, DataType::Object);
        assert_eq!(response.data, json!({"t": 1}));
    }

    #[test]
    fn test_bad_json_is_bad_data() {
        let response = evaluate("@/1234567890AB/RSP/ASCIIHEX", "{not json");
        assert!(response.is_bad_data());
        assert_eq!(response.cid, 7);
        assert_eq!(response.server, "112233445566");
        assert_eq!(response.data, json!(""));
        assert_eq!(response.data_type, DataType::AsciiHex);
    }

    #[test]
    fn test_unusable_topic_is_bad_data() {
        assert!(evaluate("@/1234567890AB/RSP/XML", OK_PAYLOAD).is_bad_data());
        assert!(evaluate("@/1234567890AB/ASCIIHEX", OK_PAYLOAD).is_bad_data());
    }

    #[test]
    fn test_non_object_is_bad_data() {
        assert!(evaluate("@/1234567890AB/RSP/ASCIIHEX", "[1,2,3]").is_bad_data());
        assert!(evaluate("@/1234567890AB/RSP/ASCIIHEX", "42").is_bad_data());
    }

    #[test]
    fn test_schema_violations_are_bad_data() {
        let non_hex = r#"{"cid":7,"server":"112233445566","response":"OK","data":"zz"}"#;
        assert!(evaluate("@/1234567890AB/RSP/ASCIIHEX", non_hex).is_bad_data());

        let hex = r#"{"cid":7,"server":"112233445566","response":"OK","data":"1a2b"}"#;
        assert_eq!(evaluate("@/1234567890AB/RSP/ASCIIHEX", hex).response, "OK");

        let extra = r#"{"cid":7,"server":"112233445566","response":"OK","data":"01","client":"1234567890AB"}"#;
        assert!(evaluate("@/1234567890AB/RSP/ASCIIHEX", extra).is_bad_data());
    }

    #[test]
    fn test_cid_mismatch_only_rejected_when_strict() {
        let validator = ResponseValidator::new().unwrap();
        let other_cid = r#"{"cid":8,"server":"112233445566","response":"OK","data":"01"}"#;

        let relaxed = evaluate_response(
            &validator,
            &settings(),
            7,
            "@/1234567890AB/RSP/ASCIIHEX",
            other_cid,
        );
        assert_eq!(relaxed.response, "OK");
        assert_eq!(relaxed.cid, 8);

        let strict_settings = EngineSettings {
            strict_cid: true,
            ..settings()
        };
        let strict = evaluate_response(
            &validator,
            &strict_settings,
            7,
            "@/1234567890AB/RSP/ASCIIHEX",
            other_cid,
        );
        assert!(strict.is_bad_data());
        assert_eq!(strict.cid, 7);
    }
}
