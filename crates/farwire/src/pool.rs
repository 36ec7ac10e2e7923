//! # Event Pooling
//!
//! Free lists for the two frame shapes. Obtaining an event reuses the
//! parameter buffer of a released one, so steady-state traffic allocates
//! nothing per call. Pooling is a performance optimization only; consumers
//! must release events after use, and the outstanding counter exists so
//! tests can verify that no event escapes a completed transaction.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::frame::ExecutionEvent;
use crate::frame::InvocationEvent;
use crate::frame::MethodId;
use crate::frame::ObjectId;
use crate::frame::TransactionId;
use crate::value::WireValue;

/// Free-list cap per shape. Beyond this, released events are simply dropped.
const POOL_CAP: usize = 64;

/// A free list for invocation and execution events.
#[derive(Debug, Default)]
pub struct EventPool {
    invocations: Mutex<Vec<InvocationEvent>>,
    executions: Mutex<Vec<ExecutionEvent>>,
    outstanding: AtomicUsize,
}

impl EventPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events obtained and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Obtains an invocation event with an empty, possibly recycled,
    /// parameter buffer.
    pub fn obtain_invocation(
        &self,
        transaction_id: TransactionId,
        object_id: ObjectId,
        method_id: MethodId,
    ) -> InvocationEvent {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        match lock(&self.invocations).pop() {
            Some(mut ev) => {
                ev.transaction_id = transaction_id;
                ev.object_id = object_id;
                ev.method_id = method_id;
                ev
            }
            None => InvocationEvent {
                transaction_id,
                object_id,
                method_id,
                params: Vec::new(),
            },
        }
    }

    /// Returns an invocation event to the free list.
    pub fn release_invocation(&self, mut ev: InvocationEvent) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        ev.params.clear();
        let mut free = lock(&self.invocations);
        if free.len() < POOL_CAP {
            free.push(ev);
        }
    }

    pub fn obtain_execution(
        &self,
        transaction_id: TransactionId,
        object_id: ObjectId,
        method_id: MethodId,
        result: WireValue,
    ) -> ExecutionEvent {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        match lock(&self.executions).pop() {
            Some(mut ev) => {
                ev.transaction_id = transaction_id;
                ev.object_id = object_id;
                ev.method_id = method_id;
                ev.result = result;
                ev
            }
            None => ExecutionEvent {
                transaction_id,
                object_id,
                method_id,
                result,
            },
        }
    }

    /// Returns an execution event to the free list.
    pub fn release_execution(&self, mut ev: ExecutionEvent) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        ev.result = WireValue::Unit;
        let mut free = lock(&self.executions);
        if free.len() < POOL_CAP {
            free.push(ev);
        }
    }

    /// Adopts an event that arrived from outside the pool (a decoded inbound
    /// frame), so its later release balances the outstanding counter.
    pub fn adopt(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }
}

// A poisoned free list only means a panic happened mid-push; the list
// contents are still valid events.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
