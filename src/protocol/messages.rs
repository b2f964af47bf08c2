//! Master/slave protocol message types
//!
//! Commands travel master -> slave as flat JSON objects on the command topic.
//! Responses travel slave -> master on the response topic; their `dataType`
//! is always derived from the format token of the topic they arrived on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status code synthesized when no response arrives in time
pub const STATUS_TIMEOUT: &str = "TM";

/// Status code synthesized for malformed or schema-violating responses
pub const STATUS_BAD_DATA: &str = "BD";

/// Highest correlation id the engine assigns (inclusive)
pub const MAX_CID: u16 = 999;

/// Format token carried as the last segment of every protocol topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    Ascii,
    #[default]
    AsciiHex,
    Json,
    Binary,
}

impl Format {
    /// All formats, in the order they appear in the topic grammar
    pub const ALL: [Format; 4] = [
        Format::Ascii,
        Format::AsciiHex,
        Format::Json,
        Format::Binary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Ascii => "ASCII",
            Format::AsciiHex => "ASCIIHEX",
            Format::Json => "JSON",
            Format::Binary => "BINARY",
        }
    }

    /// Normalized data type label for responses received on this format
    pub fn data_type(&self) -> DataType {
        match self {
            Format::AsciiHex => DataType::AsciiHex,
            Format::Binary => DataType::Base64,
            Format::Ascii => DataType::Ascii,
            Format::Json => DataType::Object,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Case-sensitive on purpose: topics are matched exactly
        match s {
            "ASCII" => Ok(Format::Ascii),
            "ASCIIHEX" => Ok(Format::AsciiHex),
            "JSON" => Ok(Format::Json),
            "BINARY" => Ok(Format::Binary),
            other => Err(MessageError::UnknownFormat(other.to_string())),
        }
    }
}

/// Encoding label of the `data` field of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Base64,
    AsciiHex,
    Ascii,
    Object,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Base64 => "base64",
            DataType::AsciiHex => "asciihex",
            DataType::Ascii => "ascii",
            DataType::Object => "object",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the response data type from the topic a response arrived on
///
/// Returns `None` when the topic has fewer than four segments or its last
/// segment is not a known format token.
pub fn data_type_for_topic(topic: &str) -> Option<DataType> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 4 {
        return None;
    }

    segments
        .last()
        .and_then(|last| last.parse::<Format>().ok())
        .map(|format| format.data_type())
}

/// Structured slave response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    pub cid: u16,
    pub server: String,
    pub response: String,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    pub data: Value,
}

impl Response {
    /// Synthesized response for a command that got no answer in time
    pub fn timeout(cid: u16, server: &str) -> Self {
        Self::not_ok(cid, server, STATUS_TIMEOUT)
    }

    /// Synthesized response for an answer that could not be accepted
    pub fn bad_data(cid: u16, server: &str) -> Self {
        Self::not_ok(cid, server, STATUS_BAD_DATA)
    }

    fn not_ok(cid: u16, server: &str, status: &str) -> Self {
        Self {
            cid,
            server: server.to_string(),
            response: status.to_string(),
            data_type: DataType::AsciiHex,
            data: Value::String(String::new()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.response == STATUS_TIMEOUT
    }

    pub fn is_bad_data(&self) -> bool {
        self.response == STATUS_BAD_DATA
    }

    /// String view of `data` for the text data types
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_str()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Command payload as submitted by callers, before tracking fields are added
pub type CommandPayload = Map<String, Value>;

/// Build the `{"command":<code>,"data":<data>}` payload used by device commands
pub fn command_payload(code: &str, data: &str) -> CommandPayload {
    let mut payload = Map::new();
    payload.insert("command".to_string(), Value::String(code.to_string()));
    payload.insert("data".to_string(), Value::String(data.to_string()));
    payload
}

/// Parse a textual command into a payload; only flat JSON objects are commands
pub fn parse_command(text: &str) -> Result<CommandPayload, MessageError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MessageError::NotAnObject),
        Err(e) => Err(MessageError::InvalidJson(e.to_string())),
    }
}

/// Add tracking information in front of the caller's fields
///
/// The result starts with `cid` then `client`; any caller-provided values for
/// those keys are replaced.
pub fn add_tracking_information(payload: CommandPayload, cid: u16, client: &str) -> CommandPayload {
    let mut tracked = Map::with_capacity(payload.len() + 2);
    tracked.insert("cid".to_string(), Value::from(cid));
    tracked.insert("client".to_string(), Value::String(client.to_string()));
    for (key, value) in payload {
        if key != "cid" && key != "client" {
            tracked.insert(key, value);
        }
    }
    tracked
}

/// Message parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("Unknown format token: '{0}'")]
    UnknownFormat(String),
    #[error("Command payload must be a JSON object")]
    NotAnObject,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}
