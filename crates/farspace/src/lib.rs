//! # Farspace
//!
//! A peer-symmetric remote-method-invocation runtime. Each peer hosts the
//! same runtime; any peer may host objects, create proxies for objects owned
//! by the other side, or both.
//!
//! ## Architecture
//!
//! A call flows caller → proxy → outbound invoker → wire → inbound
//! dispatcher → target object → wire → rendezvous store → caller. The wire
//! carries only [`farwire`] frames; remotable references cross as integer
//! object ids and are rebuilt into proxies on arrival.
//!
//! The [`space::RemoteSpace`] is an explicit runtime-context value handed to
//! connections and proxies; there are no process globals.

pub mod registry;
pub mod remotable;
pub mod host;
pub mod proxy;
pub mod rendezvous;
pub mod executor;
pub mod transport;
pub mod space;

mod outbound;
mod inbound;

#[cfg(test)]
mod mock_transport;


pub use farwire::CallPolicy;
pub use farwire::ExecutionEvent;
pub use farwire::Frame;
pub use farwire::InvocationEvent;
pub use farwire::MethodId;
pub use farwire::ObjectId;
pub use farwire::TransactionId;
pub use farwire::WireValue;

pub use registry::MethodSpec;
pub use registry::RemotableSpec;
pub use registry::TypeRef;
pub use remotable::Obj;
pub use remotable::Remotable;
pub use remotable::Value;
pub use space::RemoteSpace;
