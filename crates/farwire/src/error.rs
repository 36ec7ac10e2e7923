//! # Error Definitions
//!
//! Failures at the wire layer: codec round-trips and malformed frames.

/// Operational failures within the wire protocol itself.
#[derive(Debug, Clone)]
pub enum WireError {
    /// A frame could not be serialized.
    Encode(String),
    /// Incoming bytes did not decode into a frame.
    Decode(String),
    /// The internal structure of a frame was malformed.
    ProtocolViolation(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "encode failure: {}", msg),
            Self::Decode(msg) => write!(f, "decode failure: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for WireError {}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
