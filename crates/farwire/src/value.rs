//! # Wire Values
//!
//! The dynamic value model carried inside event frames.
//!
//! ## Invariants
//! - `Object` always carries an integer object id, never a live reference.
//!   The runtime promotes remotable arguments to ids before a frame is built.
//! - [`NULL_OBJECT`] (`-1`) is the null sentinel for remotable slots. It is
//!   also what a failure reply carries for a remotable return, so a caller
//!   cannot distinguish a timeout from a legitimately null result.

use serde::Deserialize;
use serde::Serialize;

/// The wire sentinel for a null remotable reference.
pub const NULL_OBJECT: i64 = -1;

/// A single wire-safe value inside a frame's `params` or `result` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Unit,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A hosted object id, or [`NULL_OBJECT`] for null.
    Object(i64),
}

impl WireValue {
    /// True iff this is an object slot holding the null sentinel.
    pub fn is_null_object(&self) -> bool {
        matches!(self, WireValue::Object(id) if *id == NULL_OBJECT)
    }
}
