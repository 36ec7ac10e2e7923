//! # Inbound Execution
//!
//! Receives invocation frames, rebuilds remotable arguments into proxies,
//! runs the target operation on the worker pool, and sends the execution
//! frame back on the same transport class. The receive path never runs
//! target code inline; it only decodes and queues.
//!
//! A missing target or malformed frame abandons the execution and posts a
//! failure reply carrying the zero sentinel, so a blocking caller unblocks
//! promptly instead of riding out its timeout.

use std::sync::Arc;

use farwire::ExecutionEvent;
use farwire::Frame;
use farwire::InvocationEvent;
use farwire::MethodId;
use farwire::ObjectId;
use farwire::TransactionId;
use farwire::WireValue;
use farwire::NULL_OBJECT;

use crate::outbound::send_frame;
use crate::registry::CachedMethod;
use crate::remotable::Obj;
use crate::remotable::Value;
use crate::space::Error;
use crate::space::RemoteSpace;
use crate::space::Result;
use crate::transport::Connection;

impl RemoteSpace {
    /// Entry point for inbound invocation frames.
    pub(crate) async fn handle_invocation(
        &self,
        connection: &Arc<dyn Connection>,
        event: InvocationEvent,
    ) {
        self.events.adopt();

        let transaction_id = event.transaction_id;
        let object_id = event.object_id;
        let method_id = event.method_id;

        let Some(cached) = self.registry.method_by_id(method_id) else {
            tracing::warn!(%method_id, "invocation names an unknown method");
            self.events.release_invocation(event);
            self.fail_reply(connection, transaction_id, object_id, method_id, WireValue::Unit, false)
                .await;
            return;
        };
        let policy = cached.policy();

        let Some(target) = self.hosts.get(object_id) else {
            tracing::warn!(%object_id, %transaction_id, "invocation targets an unhosted object");
            self.events.release_invocation(event);
            if !policy.no_return {
                self.fail_reply(
                    connection,
                    transaction_id,
                    object_id,
                    method_id,
                    cached.returns().zero_wire(),
                    policy.use_unreliable_transport,
                )
                .await;
            }
            return;
        };

        let args = match self.decode_params(connection, &cached, event) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(%transaction_id, error = %e, "malformed invocation parameters");
                if !policy.no_return {
                    self.fail_reply(
                        connection,
                        transaction_id,
                        object_id,
                        method_id,
                        cached.returns().zero_wire(),
                        policy.use_unreliable_transport,
                    )
                    .await;
                }
                return;
            }
        };

        let Some(space) = self.weak.upgrade() else {
            return;
        };
        let connection = connection.clone();
        let submitted = self
            .executor
            .submit(async move {
                space
                    .execute_invocation(connection, cached, transaction_id, object_id, target, args)
                    .await;
            })
            .await;
        if submitted.is_err() {
            tracing::warn!(%transaction_id, "worker pool is shut down; dropping invocation");
        }
    }

    /// Rebuilds in-process arguments from the frame, turning object ids into
    /// proxies for this connection. Consumes and releases the frame.
    fn decode_params(
        &self,
        connection: &Arc<dyn Connection>,
        cached: &CachedMethod,
        mut event: InvocationEvent,
    ) -> Result<Vec<Value>> {
        let params = std::mem::take(&mut event.params);
        self.events.release_invocation(event);

        let mut args = Vec::with_capacity(params.len());
        for (index, wire) in params.into_iter().enumerate() {
            if cached.local_param_indices.contains(&index) {
                let param_spec = cached
                    .spec
                    .params
                    .get(index)
                    .and_then(|p| p.as_remotable())
                    .ok_or_else(|| {
                        Error::Protocol(format!(
                            "'{}' has no remotable parameter {}",
                            cached.name(),
                            index
                        ))
                    })?;
                match wire {
                    WireValue::Object(NULL_OBJECT) => args.push(Value::Object(None)),
                    WireValue::Object(id) => {
                        let handle = self.create_remote(connection, ObjectId(id), param_spec);
                        args.push(Value::object(handle));
                    }
                    other => {
                        return Err(Error::Protocol(format!(
                            "parameter {} of '{}' must be an object id, got {:?}",
                            index,
                            cached.name(),
                            other
                        )))
                    }
                }
            } else {
                let value = Value::from_plain_wire(wire).ok_or_else(|| {
                    Error::Protocol(format!(
                        "parameter {} of '{}' carries an unexpected object id",
                        index,
                        cached.name()
                    ))
                })?;
                args.push(value);
            }
        }
        Ok(args)
    }

    /// Runs on a worker: invokes the target and, unless the method is
    /// fire-and-forget, replies with the execution frame.
    async fn execute_invocation(
        &self,
        connection: Arc<dyn Connection>,
        cached: Arc<CachedMethod>,
        transaction_id: TransactionId,
        object_id: ObjectId,
        target: Obj,
        args: Vec<Value>,
    ) {
        tracing::debug!(%transaction_id, %object_id, method = cached.name(), "local invocation");
        let policy = cached.policy();
        let outcome = target.dispatch(cached.name(), args).await;

        if policy.no_return {
            if let Err(e) = outcome {
                tracing::warn!(%transaction_id, error = %e, "fire-and-forget target failed");
            }
            return;
        }

        // An application failure is wrapped into a zero-sentinel reply; the
        // worker itself never crashes.
        let result = match outcome {
            Ok(value) => match self.host_result(&connection, &cached, value) {
                Ok(wire) => wire,
                Err(e) => {
                    tracing::warn!(%transaction_id, error = %e, "result promotion failed");
                    cached.returns().zero_wire()
                }
            },
            Err(e) => {
                tracing::warn!(%transaction_id, error = %e, "target dispatch failed");
                cached.returns().zero_wire()
            }
        };

        let event = self
            .events
            .obtain_execution(transaction_id, object_id, cached.id, result);
        self.send_execution(&connection, event, policy.use_unreliable_transport)
            .await;
    }

    /// Replaces a remotable return value with its hosted object id, hosting
    /// the returned object on this connection first if necessary.
    fn host_result(
        &self,
        connection: &Arc<dyn Connection>,
        cached: &CachedMethod,
        value: Value,
    ) -> Result<WireValue> {
        if cached.is_remote_return() {
            match value {
                Value::Object(None) => Ok(WireValue::Object(NULL_OBJECT)),
                Value::Object(Some(object)) => {
                    Ok(WireValue::Object(self.host_on(connection, object).0))
                }
                _ => Err(Error::Protocol(format!(
                    "'{}' must return a remotable",
                    cached.name()
                ))),
            }
        } else {
            value.to_wire().ok_or_else(|| {
                Error::Protocol(format!("'{}' returned a live object", cached.name()))
            })
        }
    }

    /// Entry point for inbound execution frames.
    pub(crate) fn handle_execution(&self, event: ExecutionEvent) {
        self.events.adopt();
        tracing::debug!(transaction_id = %event.transaction_id, "execution received");
        if let Some(event) = self.rendezvous.post(event) {
            self.events.release_execution(event);
        }
    }

    /// Posts a failure reply carrying the zero sentinel for the declared
    /// return type, so a waiting caller unblocks promptly.
    async fn fail_reply(
        &self,
        connection: &Arc<dyn Connection>,
        transaction_id: TransactionId,
        object_id: ObjectId,
        method_id: MethodId,
        sentinel: WireValue,
        unreliable: bool,
    ) {
        let event = self
            .events
            .obtain_execution(transaction_id, object_id, method_id, sentinel);
        self.send_execution(connection, event, unreliable).await;
    }

    async fn send_execution(
        &self,
        connection: &Arc<dyn Connection>,
        event: ExecutionEvent,
        unreliable: bool,
    ) {
        let frame = Frame::Execution(event);
        if let Err(e) = send_frame(connection, unreliable, &frame).await {
            tracing::warn!(
                connection = %connection.id(),
                error = %e,
                "failed to send execution frame"
            );
        }
        if let Frame::Execution(event) = frame {
            self.events.release_execution(event);
        }
    }
}
