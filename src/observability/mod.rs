//! Observability for the protocol stack: structured logging and payload redaction

pub mod logging;

// Re-export for convenience
pub use logging::{display_payload, init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::exchange_span;
