//! # Frame Codec
//!
//! The surface the serialization collaborator plugs into. The runtime core
//! never touches bytes; transports encode outbound frames and hand decoded
//! frames to their listeners. Any codec must preserve every frame field
//! exactly across a round-trip.

use crate::error::Result;
use crate::error::WireError;
use crate::frame::Frame;

/// Converts frames to and from bytes.
///
/// Object-safe so transports can hold `Arc<dyn FrameCodec>`.
pub trait FrameCodec: Send + Sync + 'static {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Frame>;
}

/// The reference codec: self-describing JSON.
///
/// Field names travel on the wire, so both frame shapes survive round-trip
/// without any out-of-band schema registration.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl FrameCodec for JsonCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        serde_json::to_vec(frame).map_err(|e| WireError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Frame> {
        serde_json::from_slice(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }
}
