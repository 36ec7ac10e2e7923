//! # Event Frames
//!
//! The two frame shapes exchanged on the wire: a request ([`InvocationEvent`])
//! and a response ([`ExecutionEvent`]). A [`TransactionId`] pairs one
//! invocation with at most one execution.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::value::WireValue;

/// Correlates one outbound invocation with at most one inbound execution.
///
/// Drawn from a process-wide monotonically increasing counter; no two
/// transactions share an id for the lifetime of a runtime.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Identifies a hosted object on the peer that owns it.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

/// Identifies one callable operation, serialized in lieu of method identity.
///
/// Ids are dense and deterministic given a registration order, which must be
/// identical on both peers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(pub u32);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method-{}", self.0)
    }
}

/// The request frame: invoke `method_id` on `object_id` with `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    pub transaction_id: TransactionId,
    pub object_id: ObjectId,
    pub method_id: MethodId,
    pub params: Vec<WireValue>,
}

/// The response frame: the outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub transaction_id: TransactionId,
    /// The object the invocation targeted.
    pub object_id: ObjectId,
    pub method_id: MethodId,
    pub result: WireValue,
}

/// The top-level frame of a wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Invocation(InvocationEvent),
    Execution(ExecutionEvent),
}

impl Frame {
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Frame::Invocation(ie) => ie.transaction_id,
            Frame::Execution(ee) => ee.transaction_id,
        }
    }
}
