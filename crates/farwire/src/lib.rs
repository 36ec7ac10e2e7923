//! # Farwire
//!
//! The wire protocol of the farspace remote-invocation runtime.
//!
//! ## Architecture
//!
//! Every remote call produces exactly one [`InvocationEvent`] outbound and,
//! unless the method is fire-and-forget, one [`ExecutionEvent`] inbound. Both
//! frames carry only wire-safe [`WireValue`]s: a remotable object reference is
//! always an integer object id (with `-1` for null), never the object itself.
//! The runtime substitutes ids for objects before a frame is built, so a live
//! reference cannot appear here by construction.

mod error;
mod value;
mod frame;
mod policy;
mod codec;
mod pool;

#[cfg(test)]
mod tests;

pub use error::WireError;
pub use error::Result;
pub use value::WireValue;
pub use value::NULL_OBJECT;
pub use frame::TransactionId;
pub use frame::ObjectId;
pub use frame::MethodId;
pub use frame::InvocationEvent;
pub use frame::ExecutionEvent;
pub use frame::Frame;
pub use policy::CallPolicy;
pub use codec::FrameCodec;
pub use codec::JsonCodec;
pub use pool::EventPool;
