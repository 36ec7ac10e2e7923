//! # Remotable Objects and In-Process Values
//!
//! A remotable object is an `Arc<dyn Remotable>`: it names its descriptor
//! table and executes operations by name. Local implementations run the
//! operation in place; proxy handles forward it across the wire. The two are
//! interchangeable everywhere the runtime touches an object, which is what
//! makes a received proxy hostable and re-sendable like any local object.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use farwire::CallPolicy;
use farwire::WireValue;

use crate::registry::RemotableSpec;

/// A live remotable object, local or proxied.
pub type Obj = Arc<dyn Remotable>;

/// Failures raised by a target operation or its dispatcher.
#[derive(Debug, Clone)]
pub enum DispatchError {
    /// The dispatcher does not know the operation.
    UnknownMethod(String),
    /// The arguments did not match what the operation expects.
    BadArguments(String),
    /// The operation itself failed.
    Failed(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod(name) => write!(f, "unknown method '{}'", name),
            Self::BadArguments(msg) => write!(f, "bad arguments: {}", msg),
            Self::Failed(msg) => write!(f, "dispatch failed: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

pub type DispatchResult = std::result::Result<Value, DispatchError>;

/// A type whose operations can be invoked across the transport.
///
/// Implementations pair a static [`RemotableSpec`] with a dispatcher that
/// executes operations by name. Dispatchers are written (or generated) per
/// target type; there is no reflection.
#[async_trait]
pub trait Remotable: Send + Sync + 'static {
    /// The descriptor table this object implements.
    fn spec(&self) -> &'static RemotableSpec;

    /// Executes one operation on this object.
    async fn dispatch(&self, method: &str, args: Vec<Value>) -> DispatchResult;

    /// A delegate may override the descriptor's call policy per call.
    /// The default keeps the descriptor policy.
    fn call_policy(&self, default: CallPolicy) -> CallPolicy {
        default
    }
}

/// An in-process argument or result value.
///
/// Unlike [`WireValue`], this side of the model may hold a live object. The
/// outbound invoker promotes `Object` slots to hosted ids before a frame is
/// built; the inbound dispatcher rebuilds them into proxies.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A remotable reference; `None` is null.
    Object(Option<Obj>),
}

impl Value {
    pub fn object(obj: Obj) -> Value {
        Value::Object(Some(obj))
    }

    pub fn null_object() -> Value {
        Value::Object(None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(Some(obj)) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null_object(&self) -> bool {
        matches!(self, Value::Object(None))
    }

    /// Converts plain data to its wire form. `None` for object slots, which
    /// must go through promotion instead.
    pub fn to_wire(&self) -> Option<WireValue> {
        match self {
            Value::Unit => Some(WireValue::Unit),
            Value::Bool(v) => Some(WireValue::Bool(*v)),
            Value::I32(v) => Some(WireValue::I32(*v)),
            Value::I64(v) => Some(WireValue::I64(*v)),
            Value::F64(v) => Some(WireValue::F64(*v)),
            Value::Str(v) => Some(WireValue::Str(v.clone())),
            Value::Bytes(v) => Some(WireValue::Bytes(v.clone())),
            Value::Object(_) => None,
        }
    }

    /// Converts plain wire data back. `None` for object slots, which must go
    /// through the proxy cache instead.
    pub fn from_plain_wire(wire: WireValue) -> Option<Value> {
        match wire {
            WireValue::Unit => Some(Value::Unit),
            WireValue::Bool(v) => Some(Value::Bool(v)),
            WireValue::I32(v) => Some(Value::I32(v)),
            WireValue::I64(v) => Some(Value::I64(v)),
            WireValue::F64(v) => Some(Value::F64(v)),
            WireValue::Str(v) => Some(Value::Str(v)),
            WireValue::Bytes(v) => Some(Value::Bytes(v)),
            WireValue::Object(_) => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::Str(v) => write!(f, "Str({:?})", v),
            Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Value::Object(None) => write!(f, "Object(null)"),
            Value::Object(Some(obj)) => write!(f, "Object({})", obj.spec().name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Object(None), Value::Object(None)) => true,
            // Objects compare by identity, matching the proxy-cache guarantee.
            (Value::Object(Some(a)), Value::Object(Some(b))) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}
