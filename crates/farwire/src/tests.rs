//! Tests for frame round-trips, call policies, and event pooling.

use crate::codec::FrameCodec;
use crate::codec::JsonCodec;
use crate::frame::ExecutionEvent;
use crate::frame::Frame;
use crate::frame::InvocationEvent;
use crate::frame::MethodId;
use crate::frame::ObjectId;
use crate::frame::TransactionId;
use crate::policy::CallPolicy;
use crate::pool::EventPool;
use crate::value::WireValue;
use crate::value::NULL_OBJECT;

// --- Codec Round-Trips ---

#[test]
fn test_invocation_round_trip_preserves_fields() {
    let codec = JsonCodec;
    let frame = Frame::Invocation(InvocationEvent {
        transaction_id: TransactionId(7),
        object_id: ObjectId(0),
        method_id: MethodId(3),
        params: vec![
            WireValue::I32(42),
            WireValue::Str("x".into()),
            WireValue::Object(5),
            WireValue::Object(NULL_OBJECT),
        ],
    });

    let bytes = codec.encode(&frame).expect("encode failed");
    let decoded = codec.decode(&bytes).expect("decode failed");

    assert_eq!(decoded, frame);
    let Frame::Invocation(ie) = decoded else {
        panic!("Expected Invocation frame");
    };
    assert_eq!(ie.transaction_id, TransactionId(7));
    assert_eq!(ie.object_id, ObjectId(0));
    assert_eq!(ie.method_id, MethodId(3));
    assert_eq!(ie.params.len(), 4);
}

#[test]
fn test_execution_round_trip_preserves_fields() {
    let codec = JsonCodec;
    let frame = Frame::Execution(ExecutionEvent {
        transaction_id: TransactionId(0),
        object_id: ObjectId(0),
        method_id: MethodId(0),
        result: WireValue::I32(42),
    });

    let bytes = codec.encode(&frame).expect("encode failed");
    let decoded = codec.decode(&bytes).expect("decode failed");

    assert_eq!(decoded, frame);
}

#[test]
fn test_scalar_values_survive_round_trip() {
    let codec = JsonCodec;
    let params = vec![
        WireValue::Unit,
        WireValue::Bool(true),
        WireValue::I32(-1),
        WireValue::I64(i64::MAX),
        WireValue::F64(2.5),
        WireValue::Str(String::new()),
        WireValue::Bytes(vec![0, 255, 7]),
    ];
    let frame = Frame::Invocation(InvocationEvent {
        transaction_id: TransactionId(1),
        object_id: ObjectId(2),
        method_id: MethodId(3),
        params: params.clone(),
    });

    let decoded = codec.decode(&codec.encode(&frame).unwrap()).unwrap();

    let Frame::Invocation(ie) = decoded else {
        panic!("Expected Invocation frame");
    };
    assert_eq!(ie.params, params);
}

#[test]
fn test_decode_rejects_garbage() {
    let codec = JsonCodec;
    let err = codec.decode(&[0xFF, 0xFF, 0xFF]).unwrap_err();
    match err {
        crate::WireError::Decode(_) => {}
        other => panic!("Expected Decode error, got {:?}", other),
    }
}

// --- Call Policy ---

#[test]
fn test_policy_defaults() {
    let p = CallPolicy::DEFAULT;
    assert!(!p.use_unreliable_transport);
    assert!(!p.no_return);
    assert!(!p.non_blocking);
    assert!(!p.closed);
    assert!(p.unbounded());
    assert!(!p.delegate_identity);
    assert!(!p.delegate_hash);
}

#[test]
fn test_policy_const_builders() {
    const P: CallPolicy = CallPolicy::DEFAULT
        .no_return()
        .unreliable()
        .response_timeout(50);
    assert!(P.no_return);
    assert!(P.use_unreliable_transport);
    assert_eq!(P.response_timeout_ms, 50);
    assert!(!P.unbounded());
}

// --- Event Pool ---

#[test]
fn test_pool_recycles_param_buffers() {
    let pool = EventPool::new();

    let mut ev = pool.obtain_invocation(TransactionId(0), ObjectId(0), MethodId(0));
    ev.params.push(WireValue::I32(1));
    ev.params.push(WireValue::I32(2));
    pool.release_invocation(ev);

    let ev = pool.obtain_invocation(TransactionId(1), ObjectId(9), MethodId(4));
    assert!(ev.params.is_empty(), "recycled buffer must be cleared");
    assert!(ev.params.capacity() >= 2, "recycled buffer keeps its capacity");
    assert_eq!(ev.transaction_id, TransactionId(1));
    assert_eq!(ev.object_id, ObjectId(9));
    assert_eq!(ev.method_id, MethodId(4));
    pool.release_invocation(ev);
}

#[test]
fn test_pool_outstanding_balances() {
    let pool = EventPool::new();
    assert_eq!(pool.outstanding(), 0);

    let ie = pool.obtain_invocation(TransactionId(0), ObjectId(0), MethodId(0));
    let ee = pool.obtain_execution(TransactionId(0), ObjectId(0), MethodId(0), WireValue::Unit);
    assert_eq!(pool.outstanding(), 2);

    pool.release_invocation(ie);
    pool.release_execution(ee);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_pool_adopt_accounts_for_inbound_frames() {
    let pool = EventPool::new();
    // A frame decoded by the transport was never obtained here.
    let ee = ExecutionEvent {
        transaction_id: TransactionId(0),
        object_id: ObjectId(0),
        method_id: MethodId(0),
        result: WireValue::I32(7),
    };
    pool.adopt();
    assert_eq!(pool.outstanding(), 1);
    pool.release_execution(ee);
    assert_eq!(pool.outstanding(), 0);
}
