//! Crate-wide error type
//!
//! Each layer has its own error enum; `MsError` is what the session, the
//! device façade and the binary propagate.

use crate::config::ConfigError;
use crate::protocol::{ProtocolError, TemplateError};
use crate::transport::mqtt::MqttError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] MqttError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Topic template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Broker connection could not be established")]
    NotConnected,

    #[error("Subscription to '{0}' could not be established")]
    NotSubscribed(String),
}

impl MsError {
    /// Message safe to print to a terminal or log aggregator
    pub fn user_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|token|secret)(\s*[=:]\s*)\S+")
        .expect("secret pattern is a valid regex")
});

/// Mask credentials that may surface through parser messages
fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}${2}***")
        .to_string();

    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}

pub type MsResult<T> = Result<T, MsError>;
