//! Error types
//!
//! Typed errors for wire decoding and configuration. Connection plumbing
//! reports through `anyhow` with context instead.

use thiserror::Error;

/// Errors decoding a frame from the event source
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame was empty
    #[error("Empty frame")]
    EmptyFrame,

    /// Unknown Engine.IO packet type
    #[error("Unknown Engine.IO packet type '{0}'")]
    UnknownEnginePacket(char),

    /// Unknown Socket.IO packet type
    #[error("Unknown Socket.IO packet type '{0}'")]
    UnknownSocketPacket(char),

    /// Binary attachments are not supported
    #[error("Binary Socket.IO packets are not supported")]
    BinaryUnsupported,

    /// Event packet without an event name
    #[error("Event packet has no event name")]
    MissingEventName,

    /// Payload was not valid JSON, or not the expected shape
    #[error("Invalid packet payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Errors in configuration values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Key is not a configuration setting
    #[error(
        "Unknown configuration key: '{0}'\n\
         Valid keys: endpoint, protocol, log_transitions, log_file, reconnect_initial_ms, reconnect_max_ms"
    )]
    UnknownKey(String),

    /// Value cannot be parsed for this key
    #[error("Invalid value for {key}: '{value}' ({expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Endpoint is not an http(s) or ws(s) URL
    #[error("Invalid endpoint '{0}'. Use an http(s):// or ws(s):// URL.")]
    InvalidEndpoint(String),
}
