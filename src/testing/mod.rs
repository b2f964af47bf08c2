//! Testing utilities and mock implementations
//!
//! Mocks for exercising the protocol engine and the session without an MQTT
//! broker.

pub mod mocks;

pub use mocks::*;
