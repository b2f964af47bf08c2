//! Master/slave protocol: message types, topics, response schema and the
//! command engine

pub mod engine;
pub mod messages;
pub mod schema;
pub mod topics;

pub use engine::{
    response_channel, EngineSettings, InboundResponse, ProtocolEngine, ProtocolError,
    ResponseReceiver, ResponseSender,
};
pub use messages::*;
pub use schema::{ResponseValidator, SchemaError, RESPONSE_SCHEMA};
pub use topics::*;
