//! Pure routing of rumqttc events
//!
//! Every event the network loop produces is classified here into an
//! [`EventRoute`]; the client acts on the route without inspecting packets.

use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, SubscribeReasonCode};
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => match connack.code {
                    ConnectReturnCode::Success => EventRoute::ConnectionAcknowledged,
                    ref code => EventRoute::ConnectionRefused(format!("{code:?}")),
                },
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: String::from_utf8_lossy(&publish.payload).to_string(),
                },
                Packet::PubAck(puback) => EventRoute::PublishAcknowledged(puback.pkid),
                Packet::SubAck(suback) => EventRoute::SubscriptionAcknowledged {
                    packet_id: suback.pkid,
                    failures: Self::subscription_failures(&suback.return_codes),
                },
                Packet::UnsubAck(unsuback) => EventRoute::UnsubscriptionAcknowledged(unsuback.pkid),
                Packet::Disconnect(disconnect) => {
                    EventRoute::Disconnected(format!("{:?}", disconnect.reason_code))
                }
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(outgoing) => match outgoing {
                Outgoing::Publish(pkid) => EventRoute::PublishSent(*pkid),
                Outgoing::Subscribe(pkid) => EventRoute::SubscribeSent(*pkid),
                Outgoing::Unsubscribe(pkid) => EventRoute::UnsubscribeSent(*pkid),
                Outgoing::Disconnect => EventRoute::ClientDisconnecting,
                _ => EventRoute::OutgoingEvent,
            },
        }
    }

    /// Reason codes of a SubAck that are not a granted QoS (pure function)
    pub fn subscription_failures(return_codes: &[SubscribeReasonCode]) -> Vec<String> {
        return_codes
            .iter()
            .filter(|code| !matches!(code, SubscribeReasonCode::Success(_)))
            .map(|code| format!("{code:?}"))
            .collect()
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Successful ConnAck
    ConnectionAcknowledged,
    /// ConnAck with a failure reason code
    ConnectionRefused(String),
    /// Message received on a subscribed topic, payload decoded as text
    MessageReceived { topic: String, payload: String },
    /// QoS 1 publish acknowledged by the broker
    PublishAcknowledged(u16),
    /// SubAck with the reason codes that did not grant a subscription
    SubscriptionAcknowledged { packet_id: u16, failures: Vec<String> },
    UnsubscriptionAcknowledged(u16),
    /// Broker sent Disconnect with the given reason
    Disconnected(String),
    /// The event loop wrote a publish with this packet id (0 for QoS 0)
    PublishSent(u16),
    SubscribeSent(u16),
    UnsubscribeSent(u16),
    /// The event loop wrote our own Disconnect
    ClientDisconnecting,
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event that needs no handling
    OutgoingEvent,
}
