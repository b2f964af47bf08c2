//! Master session: one transport, one dispatcher, one protocol engine
//!
//! The session wires the pieces together and owns their lifecycle. Startup
//! failures are reported as `false` so the caller can abort; shutdown is
//! best effort and stops the engine before the transport.

use crate::config::MsConfig;
use crate::dispatcher::{DispatcherChain, MessageDispatcher, ResponseDispatcher};
use crate::error::{MsError, MsResult};
use crate::protocol::{
    response_channel, EngineSettings, ProtocolEngine, ResponseReceiver, ResponseSender,
    TopicTemplate,
};
use crate::transport::mqtt::MqttClient;
use crate::transport::{ConnectionState, Transport};
use std::sync::Arc;
use tracing::{error, info};

pub struct MsSession<T: Transport> {
    config: MsConfig,
    transport: T,
    engine: ProtocolEngine,
    response_template: TopicTemplate,
}

/// Dispatcher routing this master's responses into `responses`
pub fn response_dispatcher(
    config: &MsConfig,
    responses: ResponseSender,
) -> MsResult<Arc<dyn MessageDispatcher>> {
    let template = config.ms.response_template()?;
    let dispatcher = ResponseDispatcher::new(&template, &config.ms.client_mac, responses)?;
    Ok(Arc::new(DispatcherChain::new().with(Arc::new(dispatcher))))
}

impl MsSession<MqttClient> {
    /// Build an MQTT-backed session; nothing touches the network yet
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: MsConfig) -> MsResult<Self> {
        let (responses_tx, responses_rx) = response_channel();
        let dispatcher = response_dispatcher(&config, responses_tx)?;
        let transport = MqttClient::new(&config.mqtt, config.logging.verbose, dispatcher);
        Self::with_transport(config, transport, responses_rx)
    }
}

impl<T: Transport> MsSession<T> {
    /// Start the protocol engine on top of an existing transport
    ///
    /// `responses` must be fed by a dispatcher attached to `transport`.
    pub fn with_transport(
        config: MsConfig,
        transport: T,
        responses: ResponseReceiver,
    ) -> MsResult<Self> {
        let response_template = config.ms.response_template()?;
        let settings = EngineSettings::from_section(&config.ms)?;
        let engine = ProtocolEngine::start(settings, transport.publisher(), responses)?;

        Ok(Self {
            config,
            transport,
            engine,
            response_template,
        })
    }

    /// Connect to the broker; on failure the transport workers are stopped
    pub async fn connect_broker(&mut self) -> bool {
        match self.transport.connect().await {
            Ok(()) => true,
            Err(e) => {
                error!("MQTT connection failed: {}", e);
                self.transport.exit_workers().await;
                false
            }
        }
    }

    /// Subscribe to `topic`, or to this master's response topic when `None`
    pub async fn subscribe(&mut self, topic: Option<&str>) -> bool {
        let topic = match topic {
            Some(topic) => topic.to_string(),
            None => self.response_subscription(),
        };

        match self.transport.subscribe(&topic).await {
            Ok(()) => true,
            Err(e) => {
                error!("MQTT subscription to '{}' failed: {}", topic, e);
                false
            }
        }
    }

    /// Connect and subscribe to the response topic
    pub async fn start(&mut self) -> MsResult<()> {
        if !self.connect_broker().await {
            return Err(MsError::NotConnected);
        }
        if !self.subscribe(None).await {
            return Err(MsError::NotSubscribed(self.response_subscription()));
        }
        info!(
            "MS: ready, client {} talking to server {}",
            self.config.ms.client_mac, self.config.ms.server_mac
        );
        Ok(())
    }

    /// Filter covering every format of this master's response topic
    pub fn response_subscription(&self) -> String {
        self.response_template
            .subscription_filter(&self.config.ms.client_mac)
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &MsConfig {
        &self.config
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.transport.connection_state()
    }

    /// Stop the engine, then unsubscribe, stop the workers and disconnect
    pub async fn graceful_exit(&mut self) {
        self.engine.graceful_exit().await;
        self.transport.disconnect_and_exit().await;
        info!("MS: session closed");
    }
}
