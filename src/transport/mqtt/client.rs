//! Impure I/O for the MQTT transport
//!
//! Four tasks cooperate here. The network loop polls rumqttc and turns
//! broker events into state changes, handshake signals and inbound queue
//! items. The publish worker drains the outbound queue one message at a time,
//! waiting for each acknowledgment. The receive worker drains the inbound
//! queue into the dispatcher. Callers block only in `connect`, `subscribe`
//! and `unsubscribe`.

use super::connection::{
    configure_mqtt_options, qos_from_level, ConnectionState, MqttError, ReconnectConfig,
};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler};
use super::pending::{Assignment, PendingAcks};
use super::signal::Signal;
use crate::config::MqttSection;
use crate::dispatcher::MessageDispatcher;
use crate::observability::display_payload;
use crate::transport::{Publisher, Transport};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, ConnectionError, EventLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the request channel between client handles and the event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long an orderly disconnect may take before the network loop is aborted
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Item on the publish and receive queues
#[derive(Debug)]
enum QueueItem {
    Message { topic: String, payload: String },
    Terminate,
}

#[derive(Debug, Clone, Copy)]
struct PayloadLogging {
    verbose: bool,
    long_payload: usize,
}

impl PayloadLogging {
    fn show<'a>(&self, payload: &'a str) -> &'a str {
        display_payload(payload, self.verbose, self.long_payload)
    }
}

/// State shared by the client handle, the workers and the network loop
struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    subscribed: Signal,
    unsubscribed: Signal,
    published: Signal,
    pending_subscriptions: Mutex<PendingAcks<String>>,
    pending_unsubscriptions: Mutex<PendingAcks<String>>,
    pending_messages: Mutex<PendingAcks<String>>,
    subscribed_topics: Mutex<Vec<String>>,
    inbound: mpsc::UnboundedSender<QueueItem>,
    publish_qos: QoS,
    logging: PayloadLogging,
    ever_connected: AtomicBool,
    closing: AtomicBool,
}

impl Shared {
    fn new(
        inbound: mpsc::UnboundedSender<QueueItem>,
        publish_qos: QoS,
        logging: PayloadLogging,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Shared {
            state_tx,
            subscribed: Signal::new(),
            unsubscribed: Signal::new(),
            published: Signal::new(),
            pending_subscriptions: Mutex::new(PendingAcks::new()),
            pending_unsubscriptions: Mutex::new(PendingAcks::new()),
            pending_messages: Mutex::new(PendingAcks::new()),
            subscribed_topics: Mutex::new(Vec::new()),
            inbound,
            publish_qos,
            logging,
            ever_connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            HealthMonitor::log_state_transition(&previous, &next);
        }
    }

    async fn clear_pending(&self) {
        self.pending_subscriptions.lock().await.clear();
        self.pending_unsubscriptions.lock().await.clear();
        self.pending_messages.lock().await.clear();
    }
}

/// Cloneable enqueue-only handle to the publish worker
#[derive(Clone)]
pub struct MqttPublisher {
    outbound: mpsc::UnboundedSender<QueueItem>,
    logging: PayloadLogging,
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: String) {
        info!("MQTT publish: -t '{}' -m '{}'", topic, self.logging.show(&payload));

        let item = QueueItem::Message {
            topic: topic.to_string(),
            payload,
        };
        if self.outbound.send(item).is_err() {
            warn!("MQTT publish worker has exited, message to '{}' dropped", topic);
        }
    }
}

/// MQTT transport for the master side of the protocol
pub struct MqttClient {
    config: MqttSection,
    client: AsyncClient,
    // Mutex only makes the client Sync; the loop is taken whole by `connect`
    event_loop: Option<Mutex<EventLoop>>,
    event_loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    reconnect_config: ReconnectConfig,
    shared: Arc<Shared>,
    publisher: MqttPublisher,
    publish_worker: Option<JoinHandle<()>>,
    receive_worker: Option<JoinHandle<()>>,
}

impl MqttClient {
    /// Create the transport and start its publish and receive workers
    ///
    /// Must be called from within a Tokio runtime. The broker connection is
    /// only opened by [`MqttClient::connect`].
    pub fn new(config: &MqttSection, verbose: bool, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        let (client, event_loop) =
            AsyncClient::new(configure_mqtt_options(config), REQUEST_CHANNEL_CAPACITY);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        let logging = PayloadLogging {
            verbose,
            long_payload: config.long_payload,
        };

        let shared = Arc::new(Shared::new(
            inbound_tx,
            qos_from_level(config.qos),
            logging,
        ));

        let publish_worker = tokio::spawn(Self::run_publish_worker(
            client.clone(),
            shared.clone(),
            outbound_rx,
            config.publish_ack_timeout(),
        ));
        let receive_worker = tokio::spawn(Self::run_receive_worker(dispatcher, inbound_rx));

        MqttClient {
            config: config.clone(),
            client,
            event_loop: Some(Mutex::new(event_loop)),
            event_loop_handle: None,
            shutdown_tx,
            reconnect_config: ReconnectConfig::default(),
            shared,
            publisher: MqttPublisher {
                outbound: outbound_tx,
                logging,
            },
            publish_worker: Some(publish_worker),
            receive_worker: Some(receive_worker),
        }
    }

    /// Replace the reconnection policy; takes effect on the next `connect`
    pub fn set_reconnect_config(&mut self, reconnect_config: ReconnectConfig) {
        self.reconnect_config = reconnect_config;
    }

    /// Wait for the network loop to report the outcome of the first connect
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let outcome = tokio::time::timeout(
            timeout,
            state_rx.wait_for(|state| {
                !matches!(
                    state,
                    ConnectionState::Connecting | ConnectionState::Reconnecting(_)
                )
            }),
        )
        .await;

        match outcome {
            Ok(Ok(state)) => match &*state {
                ConnectionState::Connected => Ok(()),
                ConnectionState::Disconnected(reason)
                | ConnectionState::PermanentlyDisconnected(reason) => {
                    Err(MqttError::ConnectionFailed(reason.clone()))
                }
                other => Err(MqttError::ConnectionFailed(format!(
                    "Unexpected state {other:?}"
                ))),
            },
            Ok(Err(_)) => Err(MqttError::ConnectionFailed(
                "State channel closed".to_string(),
            )),
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Open the broker connection and wait for its acknowledgment
    ///
    /// On failure or timeout the network loop is stopped; there is no retry.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or(MqttError::AlreadyStarted)?
            .into_inner();

        info!(
            "MQTT connecting to MQTT broker at {}:{}...",
            self.config.host, self.config.port
        );

        let state_rx = self.shared.state_tx.subscribe();
        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            self.shared.clone(),
            self.client.clone(),
            self.reconnect_config.clone(),
            self.shutdown_tx.subscribe(),
        ));
        self.event_loop_handle = Some(handle);

        match Self::wait_for_connection_confirmation(state_rx, self.config.connect_timeout()).await
        {
            Ok(()) => {
                info!("MQTT connection established");
                Ok(())
            }
            Err(e) => {
                warn!("No MQTT connection was established: {}", e);
                self.shared.closing.store(true, Ordering::SeqCst);
                let _ = self.shutdown_tx.send(true);
                Err(e)
            }
        }
    }

    async fn run_event_loop(
        mut event_loop: EventLoop,
        shared: Arc<Shared>,
        client: AsyncClient,
        reconnect_config: ReconnectConfig,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        debug!("MQTT network loop started");
        let mut reconnect_attempts = 0u32;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Shutdown signal received, stopping MQTT network loop");
                        break;
                    }
                }

                event = event_loop.poll() => {
                    let keep_running = match event {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            Self::process_event_route(route, &shared, &client, &mut reconnect_attempts)
                                .await
                        }
                        Err(e) => {
                            Self::handle_event_loop_error(
                                e,
                                &shared,
                                &reconnect_config,
                                &mut reconnect_attempts,
                                shutdown_rx.clone(),
                            )
                            .await
                        }
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }

        debug!("MQTT network loop stopped");
    }

    /// Act on a routed event; returns false to stop the network loop
    async fn process_event_route(
        route: EventRoute,
        shared: &Shared,
        client: &AsyncClient,
        reconnect_attempts: &mut u32,
    ) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged => {
                let reconnected = shared.ever_connected.swap(true, Ordering::SeqCst);
                *reconnect_attempts = 0;
                shared.transition(ConnectionEvent::ConnAckReceived);
                if reconnected {
                    Self::resubscribe_to_topics(client, shared).await;
                }
            }
            EventRoute::ConnectionRefused(code) => {
                shared.transition(ConnectionEvent::ConnectionRefused(code));
            }
            EventRoute::MessageReceived { topic, payload } => {
                info!(
                    "MQTT receive: -t '{}' -m '{}'",
                    topic,
                    shared.logging.show(&payload)
                );
                if shared
                    .inbound
                    .send(QueueItem::Message { topic, payload })
                    .is_err()
                {
                    warn!("MQTT receive worker has exited, message dropped");
                }
            }
            EventRoute::PublishSent(pkid) => {
                let mut pending = shared.pending_messages.lock().await;
                match pending.assign(pkid) {
                    // QoS 0 has no acknowledgment packet; written is published
                    Assignment::Tracked if shared.publish_qos == QoS::AtMostOnce => {
                        if let Some(topic) = pending.acknowledge(pkid) {
                            debug!("MQTT message to '{}' published", topic);
                            shared.published.set();
                        }
                    }
                    Assignment::Tracked => {}
                    Assignment::Abandoned => {
                        debug!("MQTT publish {} written after its wait was given up", pkid)
                    }
                    Assignment::Untracked => debug!("Untracked publish {}", pkid),
                }
            }
            EventRoute::PublishAcknowledged(pkid) => {
                match shared.pending_messages.lock().await.acknowledge(pkid) {
                    Some(topic) => {
                        info!(
                            "MQTT message with mid '{}' to '{}' successfully published",
                            pkid, topic
                        );
                        shared.published.set();
                    }
                    None => debug!("Acknowledgment for untracked publish {}", pkid),
                }
            }
            EventRoute::SubscribeSent(pkid) => {
                let assignment = shared.pending_subscriptions.lock().await.assign(pkid);
                if assignment != Assignment::Tracked {
                    debug!("Subscribe request {} is not awaited ({:?})", pkid, assignment);
                }
            }
            EventRoute::SubscriptionAcknowledged {
                packet_id,
                failures,
            } => {
                let topic = shared.pending_subscriptions.lock().await.acknowledge(packet_id);
                if failures.is_empty() {
                    match topic {
                        Some(topic) => {
                            info!("MQTT subscription to '{}' acknowledged", topic);
                            shared.subscribed.set();
                        }
                        None => info!(
                            "MQTT subscription with mid '{}' acknowledged but no topic found in pending subscriptions",
                            packet_id
                        ),
                    }
                } else {
                    error!(
                        "MQTT subscription to '{}' rejected: {}",
                        topic.as_deref().unwrap_or("<unknown>"),
                        failures.join(", ")
                    );
                }
            }
            EventRoute::UnsubscribeSent(pkid) => {
                let assignment = shared.pending_unsubscriptions.lock().await.assign(pkid);
                if assignment != Assignment::Tracked {
                    debug!("Unsubscribe request {} is not awaited ({:?})", pkid, assignment);
                }
            }
            EventRoute::UnsubscriptionAcknowledged(pkid) => {
                match shared.pending_unsubscriptions.lock().await.acknowledge(pkid) {
                    Some(topic) => {
                        info!(
                            "MQTT unsubscribe acknowledgment for mid '{}' received ({})",
                            pkid, topic
                        );
                        shared.unsubscribed.set();
                    }
                    None => debug!("Acknowledgment for untracked unsubscribe {}", pkid),
                }
            }
            EventRoute::Disconnected(reason) => {
                shared.transition(ConnectionEvent::DisconnectedByBroker(reason));
            }
            EventRoute::ClientDisconnecting => {
                shared.transition(ConnectionEvent::ClientDisconnected);
                return false;
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::OutgoingEvent => {}
        }
        true
    }

    /// Handle a failed poll; returns true to keep polling (which reconnects)
    async fn handle_event_loop_error(
        error: ConnectionError,
        shared: &Shared,
        reconnect_config: &ReconnectConfig,
        reconnect_attempts: &mut u32,
        shutdown_rx: watch::Receiver<bool>,
    ) -> bool {
        let shutdown_requested = shared.closing.load(Ordering::SeqCst) || *shutdown_rx.borrow();
        let decision = HealthMonitor::should_attempt_reconnection(
            *reconnect_attempts,
            reconnect_config,
            shared.ever_connected.load(Ordering::SeqCst),
            shutdown_requested,
        );

        match decision {
            ReconnectionDecision::AbortShutdownRequested => {
                debug!("MQTT connection closed during shutdown: {}", error);
                shared.transition(ConnectionEvent::ClientDisconnected);
                false
            }
            ReconnectionDecision::AbortNeverConnected => {
                shared.transition(ConnectionEvent::NetworkError(error.to_string()));
                false
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                shared.transition(ConnectionEvent::NetworkError(error.to_string()));
                error!("Failed to reconnect: {}", error);
                shared.transition(ConnectionEvent::PermanentFailure(format!(
                    "Reconnection failed: {error}"
                )));
                false
            }
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                shared.transition(ConnectionEvent::NetworkError(error.to_string()));
                *reconnect_attempts = attempt;
                shared.transition(ConnectionEvent::ReconnectionStarted(attempt));
                // Requests in flight on the old connection will never be acknowledged
                shared.clear_pending().await;
                Self::interruptible_sleep(shutdown_rx, delay_ms).await
            }
        }
    }

    /// Sleep unless shutdown is requested; returns false on shutdown
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    /// Re-issue tracked subscriptions on a fresh connection
    ///
    /// Runs on the network loop, so requests are queued without waiting.
    async fn resubscribe_to_topics(client: &AsyncClient, shared: &Shared) {
        let topics = shared.subscribed_topics.lock().await.clone();
        for topic in topics {
            let ticket = shared
                .pending_subscriptions
                .lock()
                .await
                .request(topic.clone());
            match client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                Ok(()) => debug!(target: "mqtt_transport", "Re-subscribing to: {}", topic),
                Err(e) => {
                    shared.pending_subscriptions.lock().await.withdraw(ticket);
                    error!("Failed to re-subscribe to {}: {}", topic, e);
                }
            }
        }
    }

    async fn run_publish_worker(
        client: AsyncClient,
        shared: Arc<Shared>,
        mut outbound_rx: mpsc::UnboundedReceiver<QueueItem>,
        ack_timeout: Duration,
    ) {
        info!("MQTT entered publishing worker");

        while let Some(item) = outbound_rx.recv().await {
            let (topic, payload) = match item {
                QueueItem::Message { topic, payload } => (topic, payload),
                QueueItem::Terminate => break,
            };

            shared.published.clear();
            let ticket = shared.pending_messages.lock().await.request(topic.clone());

            if let Err(e) = client
                .publish(topic.clone(), shared.publish_qos, false, payload)
                .await
            {
                shared.pending_messages.lock().await.withdraw(ticket);
                warn!("MQTT failed to publish message to topic '{}': {}", topic, e);
                continue;
            }

            if !shared.published.wait(ack_timeout).await {
                // Still in the client channel; its late write must not count for the next one
                shared.pending_messages.lock().await.abandon(ticket);
                warn!(
                    "MQTT publish to '{}' not acknowledged within {:?}",
                    topic, ack_timeout
                );
            }
        }

        info!("MQTT exited publishing worker");
    }

    async fn run_receive_worker(
        dispatcher: Arc<dyn MessageDispatcher>,
        mut inbound_rx: mpsc::UnboundedReceiver<QueueItem>,
    ) {
        info!("MQTT entered receiving worker");

        while let Some(item) = inbound_rx.recv().await {
            match item {
                QueueItem::Message { topic, payload } => {
                    if !dispatcher.handle_message(&topic, &payload) {
                        debug!("Message on '{}' was not handled", topic);
                    }
                }
                QueueItem::Terminate => break,
            }
        }

        info!("MQTT exited receiving worker");
    }

    /// Subscribe and wait for the broker's acknowledgment
    pub async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        let state = self.shared.state();
        if !HealthMonitor::can_subscribe(&state) {
            return Err(MqttError::NotConnected { state });
        }

        info!("MQTT subscribing to topic: {}", topic);

        self.shared.subscribed.clear();
        let ticket = self
            .shared
            .pending_subscriptions
            .lock()
            .await
            .request(topic.to_string());

        if let Err(e) = self.client.subscribe(topic, QoS::AtLeastOnce).await {
            self.shared.pending_subscriptions.lock().await.withdraw(ticket);
            return Err(MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            });
        }

        let timeout = self.config.subscribe_timeout();
        if self.shared.subscribed.wait(timeout).await {
            let mut topics = self.shared.subscribed_topics.lock().await;
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
            info!("MQTT subscription established");
            Ok(())
        } else {
            self.shared
                .pending_subscriptions
                .lock()
                .await
                .abandon(ticket);
            warn!("No MQTT subscription established in time");
            Err(MqttError::SubscribeTimeout {
                topic: topic.to_string(),
                timeout,
            })
        }
    }

    /// Unsubscribe and wait (bounded) for the broker's acknowledgment
    pub async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.shared.unsubscribed.clear();
        let ticket = self
            .shared
            .pending_unsubscriptions
            .lock()
            .await
            .request(topic.to_string());

        if let Err(e) = self.client.unsubscribe(topic).await {
            self.shared
                .pending_unsubscriptions
                .lock()
                .await
                .withdraw(ticket);
            return Err(e.into());
        }

        let timeout = self.config.subscribe_timeout();
        let acknowledged = self.shared.unsubscribed.wait(timeout).await;
        if !acknowledged {
            self.shared
                .pending_unsubscriptions
                .lock()
                .await
                .abandon(ticket);
        }
        self.shared
            .subscribed_topics
            .lock()
            .await
            .retain(|t| t != topic);

        if acknowledged {
            Ok(())
        } else {
            Err(MqttError::UnsubscribeTimeout {
                topic: topic.to_string(),
                timeout,
            })
        }
    }

    async fn unsubscribe_all(&mut self) {
        let topics = self.shared.subscribed_topics.lock().await.clone();
        if topics.is_empty() {
            return;
        }

        let state = self.shared.state();
        if state != ConnectionState::Connected {
            warn!("MQTT not connected ({:?}), skipping unsubscribe", state);
            return;
        }

        let mut all_acknowledged = true;
        for topic in topics {
            if let Err(e) = self.unsubscribe(&topic).await {
                error!("MQTT unsubscribing did not finish: {}", e);
                all_acknowledged = false;
            }
        }
        if all_acknowledged {
            info!("MQTT unsubscribed successfully");
        }
    }

    async fn join_worker(name: &str, mut handle: JoinHandle<()>, timeout: Duration) {
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("MQTT {} worker ended with error: {}", name, e),
            Err(_) => {
                warn!("MQTT {} worker did not stop in time, aborting", name);
                handle.abort();
            }
        }
    }

    /// Stop the publish and receive workers; idempotent
    pub async fn exit_workers(&mut self) {
        // The publish worker may be waiting out one acknowledgment
        let join_timeout = self.config.publish_ack_timeout() + Duration::from_secs(1);

        if let Some(handle) = self.publish_worker.take() {
            let _ = self.publisher.outbound.send(QueueItem::Terminate);
            Self::join_worker("publishing", handle, join_timeout).await;
        }

        if let Some(handle) = self.receive_worker.take() {
            let _ = self.shared.inbound.send(QueueItem::Terminate);
            Self::join_worker("receiving", handle, join_timeout).await;
        }
    }

    /// Unsubscribe, stop the workers and close the connection; best effort
    pub async fn disconnect_and_exit(&mut self) {
        info!("MQTT initiating clean shutdown...");

        self.unsubscribe_all().await;
        self.exit_workers().await;

        let was_connected = self.shared.state() == ConnectionState::Connected;
        self.shared.closing.store(true, Ordering::SeqCst);

        if was_connected {
            match self.client.try_disconnect() {
                Ok(()) => info!("MQTT disconnected from MQTT broker."),
                Err(e) => error!("MQTT error while disconnecting from the broker: {}", e),
            }
        }

        if let Some(mut handle) = self.event_loop_handle.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                .await
                .is_err()
            {
                warn!("MQTT network loop didn't shut down gracefully, forcing abort");
                let _ = self.shutdown_tx.send(true);
                handle.abort();
            }
        }

        info!("MQTT clean shutdown complete.");
    }

    /// Get current connection state, `None` before `connect`
    pub fn connection_state(&self) -> Option<ConnectionState> {
        if self.event_loop.is_some() {
            None
        } else {
            Some(self.shared.state())
        }
    }

    pub fn is_permanently_disconnected(&self) -> bool {
        matches!(
            self.connection_state(),
            Some(ConnectionState::PermanentlyDisconnected(_))
        )
    }

    /// Topics that will be re-subscribed after a reconnect
    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.shared.subscribed_topics.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, topic).await
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        MqttClient::unsubscribe(self, topic).await
    }

    async fn disconnect_and_exit(&mut self) {
        MqttClient::disconnect_and_exit(self).await
    }

    async fn exit_workers(&mut self) {
        MqttClient::exit_workers(self).await
    }

    fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::new(self.publisher.clone())
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttClient::connection_state(self)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);

        // No async in Drop; disconnect_and_exit is the orderly path
        for handle in [
            self.event_loop_handle.take(),
            self.publish_worker.take(),
            self.receive_worker.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}
