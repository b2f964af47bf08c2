//! Routing of inbound transport messages
//!
//! The receive worker hands every message to one [`MessageDispatcher`]. A
//! dispatcher either claims the message and returns `true`, or declines it so
//! another consumer can try.

use crate::protocol::engine::{InboundResponse, ResponseSender};
use crate::protocol::topics::{TemplateError, TopicTemplate};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait MessageDispatcher: Send + Sync {
    /// Returns `true` when the message was handled
    fn handle_message(&self, topic: &str, payload: &str) -> bool;
}

/// Forwards protocol responses for this master to the engine
#[derive(Debug)]
pub struct ResponseDispatcher {
    pattern: Regex,
    responses: ResponseSender,
}

impl ResponseDispatcher {
    /// Match `rsp_template` rendered for `client_mac` in any format
    pub fn new(
        rsp_template: &TopicTemplate,
        client_mac: &str,
        responses: ResponseSender,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            pattern: rsp_template.matcher(client_mac)?,
            responses,
        })
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.pattern.is_match(topic)
    }
}

impl MessageDispatcher for ResponseDispatcher {
    fn handle_message(&self, topic: &str, payload: &str) -> bool {
        if !self.matches(topic) {
            return false;
        }

        let response = InboundResponse {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        if self.responses.send(response).is_err() {
            warn!("Protocol engine has stopped, dropping response on {}", topic);
        }
        true
    }
}

/// Tries dispatchers in order; the first one to handle a message wins
#[derive(Default)]
pub struct DispatcherChain {
    dispatchers: Vec<Arc<dyn MessageDispatcher>>,
}

impl DispatcherChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn push(&mut self, dispatcher: Arc<dyn MessageDispatcher>) {
        self.dispatchers.push(dispatcher);
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

impl MessageDispatcher for DispatcherChain {
    fn handle_message(&self, topic: &str, payload: &str) -> bool {
        let handled = self
            .dispatchers
            .iter()
            .any(|dispatcher| dispatcher.handle_message(topic, payload));

        if !handled {
            debug!("No dispatcher handled message on {}", topic);
        }
        handled
    }
}
