//! # Outbound Invocation
//!
//! Encodes a call, sends it, and either blocks on the rendezvous store,
//! defers the result, or returns immediately, as the method's policy
//! dictates. Remotable arguments are promoted to hosted object ids before
//! the frame is built; a remotable result is decoded back into a proxy.

use std::sync::Arc;

use farwire::Frame;
use farwire::ObjectId;
use farwire::TransactionId;
use farwire::WireValue;
use farwire::NULL_OBJECT;

use crate::registry::CachedMethod;
use crate::registry::RemotableSpec;
use crate::remotable::Obj;
use crate::remotable::Value;
use crate::space::AsyncExecution;
use crate::space::Error;
use crate::space::RemoteSpace;
use crate::space::Result;
use crate::transport;
use crate::transport::Connection;

/// Operation name served by the delegate when its policy says the peer's
/// stringification is overridden.
pub const IDENTITY_METHOD: &str = "to_string";
/// Operation name served by the delegate when its policy overrides hashing.
pub const HASH_METHOD: &str = "hash";

impl RemoteSpace {
    /// Carries one operation of a proxy across the transport.
    ///
    /// The proxy handle supplies everything it closed over: the connection,
    /// the remote object id, the capability spec, and the optional delegate.
    pub(crate) async fn invoke(
        &self,
        connection: &Arc<dyn Connection>,
        object_id: ObjectId,
        spec: &'static RemotableSpec,
        delegate: Option<&Obj>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        // Operations the delegate itself declares never go remote.
        if let Some(delegate) = delegate {
            if delegate.spec().declares(method, args.len()) {
                return Ok(delegate.dispatch(method, args).await?);
            }
        }

        let Some(cached) = self.registry.resolve(spec.name, method, args.len()) else {
            return Err(Error::UnknownMethod {
                type_name: spec.name,
                method: method.to_string(),
                arity: args.len(),
            });
        };
        let policy = match delegate {
            Some(delegate) => delegate.call_policy(cached.policy()),
            None => cached.policy(),
        };

        if let Some(delegate) = delegate {
            let identity = policy.delegate_identity && method == IDENTITY_METHOD;
            let hashing = policy.delegate_hash && method == HASH_METHOD;
            if identity || hashing {
                return Ok(delegate.dispatch(method, args).await?);
            }
        }

        if policy.closed {
            return Ok(cached.returns().zero_value());
        }

        let transaction_id = self.allocate_transaction();
        tracing::debug!(
            %transaction_id,
            %object_id,
            method = cached.name(),
            connection = %connection.id(),
            "remote invocation"
        );

        let mut event = self
            .events
            .obtain_invocation(transaction_id, object_id, cached.id);
        if let Err(e) = self.promote_params(connection, &cached, args, &mut event.params) {
            self.events.release_invocation(event);
            return Err(e);
        }

        if !policy.no_return {
            self.outstanding.insert(transaction_id, connection.id());
        }

        let frame = Frame::Invocation(event);
        let sent = send_frame(connection, policy.use_unreliable_transport, &frame).await;
        if let Frame::Invocation(event) = frame {
            self.events.release_invocation(event);
        }
        if let Err(e) = sent {
            self.outstanding.remove(&transaction_id);
            return Err(e.into());
        }

        if policy.no_return {
            return Ok(cached.returns().zero_value());
        }
        if policy.non_blocking {
            self.async_executions.insert(
                transaction_id,
                AsyncExecution {
                    connection: connection.clone(),
                    response_timeout_ms: policy.response_timeout_ms,
                },
            );
            return Ok(cached.returns().zero_value());
        }

        let zero = cached.returns().zero_value();
        self.await_result(connection, transaction_id, policy.response_timeout_ms, zero)
            .await
    }

    /// Replaces each remotable argument with its hosted object id, hosting
    /// the object on this connection first if it is not hosted anywhere yet.
    fn promote_params(
        &self,
        connection: &Arc<dyn Connection>,
        cached: &CachedMethod,
        args: Vec<Value>,
        out: &mut Vec<WireValue>,
    ) -> Result<()> {
        for (index, arg) in args.into_iter().enumerate() {
            let wire = if cached.local_param_indices.contains(&index) {
                match arg {
                    Value::Object(None) => WireValue::Object(NULL_OBJECT),
                    Value::Object(Some(object)) => {
                        WireValue::Object(self.host_on(connection, object).0)
                    }
                    _ => {
                        return Err(Error::TypeMismatch {
                            method: cached.name(),
                            index,
                        })
                    }
                }
            } else {
                arg.to_wire().ok_or(Error::TypeMismatch {
                    method: cached.name(),
                    index,
                })?
            };
            out.push(wire);
        }
        Ok(())
    }

    /// Blocks on the rendezvous store and decodes the outcome. A timeout or
    /// a dropped connection yields the zero sentinel, indistinguishable from
    /// a legitimately null result.
    pub(crate) async fn await_result(
        &self,
        connection: &Arc<dyn Connection>,
        transaction_id: TransactionId,
        timeout_ms: i64,
        zero: Value,
    ) -> Result<Value> {
        let outcome = self.rendezvous.wait(transaction_id, timeout_ms).await;
        self.outstanding.remove(&transaction_id);

        let Some(mut event) = outcome else {
            tracing::debug!(%transaction_id, "wait ended without a result; returning zero");
            return Ok(zero);
        };

        let result = std::mem::replace(&mut event.result, WireValue::Unit);
        let return_spec = self
            .registry
            .method_by_id(event.method_id)
            .and_then(|m| m.remote_return);
        self.events.release_execution(event);

        if let Some(return_spec) = return_spec {
            match result {
                WireValue::Object(NULL_OBJECT) => Ok(Value::Object(None)),
                WireValue::Object(id) => {
                    let handle = self.create_remote(connection, ObjectId(id), return_spec);
                    Ok(Value::object(handle))
                }
                other => Err(Error::Protocol(format!(
                    "expected an object id result for {}, got {:?}",
                    transaction_id, other
                ))),
            }
        } else {
            Value::from_plain_wire(result).ok_or_else(|| {
                Error::Protocol(format!("unexpected object id result for {}", transaction_id))
            })
        }
    }

    // --- Deferred Results ---

    /// Retrieves the result of a non-blocking call, waiting up to the
    /// method's own response timeout.
    pub async fn get_result(&self, transaction_id: TransactionId) -> Result<Value> {
        self.get_result_within(transaction_id, -1).await
    }

    /// Retrieves the result of a non-blocking call. The effective deadline is
    /// the maximum of the method's response timeout and `extra_timeout_ms`.
    pub async fn get_result_within(
        &self,
        transaction_id: TransactionId,
        extra_timeout_ms: i64,
    ) -> Result<Value> {
        let (_, record) = self
            .async_executions
            .remove(&transaction_id)
            .ok_or(Error::UnknownTransaction(transaction_id))?;
        let timeout_ms = record.response_timeout_ms.max(extra_timeout_ms);
        let connection = record.connection;
        self.await_result(&connection, transaction_id, timeout_ms, Value::Unit)
            .await
    }

    /// [`RemoteSpace::get_result`] against the most recent transaction id.
    /// Only meaningful when no other thread issued an intervening call.
    pub async fn get_last_result(&self) -> Result<Value> {
        self.get_result(self.last_transaction_id()).await
    }

    /// [`RemoteSpace::get_result_within`] against the most recent
    /// transaction id.
    pub async fn get_last_result_within(&self, extra_timeout_ms: i64) -> Result<Value> {
        self.get_result_within(self.last_transaction_id(), extra_timeout_ms)
            .await
    }
}

/// Sends a frame on the transport class the policy selects.
pub(crate) async fn send_frame(
    connection: &Arc<dyn Connection>,
    unreliable: bool,
    frame: &Frame,
) -> transport::Result<()> {
    if unreliable {
        connection.send_unreliable(frame).await
    } else {
        connection.send_reliable(frame).await
    }
}
