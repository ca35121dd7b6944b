mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use brewbridge_core::shutdown;
use brewbridge_core::*;
use common::{MockActuator, fast_policy, payload, shared, target};

fn reconciler(actuator: Arc<MockActuator>) -> Reconciler {
    Reconciler::new(target(), fast_policy(5), actuator, Shutdown::never())
}

fn as_json(record: &StateRecord) -> Value {
    serde_json::from_slice(&encode(record).unwrap()).unwrap()
}

#[tokio::test]
async fn test_turns_on_and_confirms() {
    let actuator = shared(MockActuator::new(false).with_lag(2));
    let record = decode(br#"{"key":"svc1","data":{"pump":{"desiredState":1,"state":0}}}"#).unwrap();

    let updated = reconciler(actuator.clone())
        .reconcile(record)
        .await
        .unwrap()
        .expect("record should change");

    assert_eq!(actuator.writes(), vec![true]);
    assert!(actuator.value());
    // one drift-check read plus three confirmation polls
    assert_eq!(actuator.reads(), 4);
    assert_eq!(
        as_json(&updated),
        json!({"key": "svc1", "data": {"pump": {"desiredState": 1, "state": 1}}})
    );
}

#[tokio::test]
async fn test_already_on_is_noop() {
    let actuator = shared(MockActuator::new(true));
    let record = decode(&payload("1", "0")).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await.unwrap();

    assert!(result.is_none());
    assert!(actuator.writes().is_empty());
}

#[tokio::test]
async fn test_absent_block_is_not_found() {
    let actuator = shared(MockActuator::new(false));
    let record =
        decode(br#"{"key":"svc1","data":{"other":{"desiredState":1,"state":0}}}"#).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert!(matches!(result, Err(BridgeError::BlockNotFound { .. })));
    assert_eq!(actuator.reads(), 0);
    assert!(actuator.writes().is_empty());
}

#[tokio::test]
async fn test_other_key_is_not_found() {
    let actuator = shared(MockActuator::new(false));
    let record =
        decode(br#"{"key":"svc2","data":{"pump":{"desiredState":1,"state":0}}}"#).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert!(matches!(
        result,
        Err(BridgeError::BlockNotFound { ref key, .. }) if key == "svc2"
    ));
    assert_eq!(actuator.reads(), 0);
}

#[tokio::test]
async fn test_never_converges() {
    let actuator = shared(MockActuator::new(false).stuck());
    let record = decode(&payload("1", "0")).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert_eq!(
        result,
        Err(BridgeError::ActuationFailure(
            ActuationError::NotConverged {
                target: true,
                attempts: 5
            }
        ))
    );
    assert_eq!(actuator.writes(), vec![true]);
}

#[tokio::test]
async fn test_in_sync_records_issue_no_writes() {
    for (desired, state, live) in [("1", "1", true), ("0", "0", false)] {
        let actuator = shared(MockActuator::new(live));
        let record = decode(&payload(desired, state)).unwrap();

        let result = reconciler(actuator.clone()).reconcile(record).await.unwrap();

        assert!(result.is_none());
        assert!(actuator.writes().is_empty());
        assert_eq!(actuator.reads(), 1);
    }
}

#[tokio::test]
async fn test_result_only_when_write_confirmed() {
    let cases = [
        ("1", "null", false, true),
        ("1", "null", true, true),
        ("0", "1", true, true),
        ("0", "1", false, false),
        ("1", "1", false, true),
        ("1", "1", true, false),
        ("null", "1", false, false),
    ];

    for (desired, state, live, expect_change) in cases {
        let actuator = shared(MockActuator::new(live));
        let record = decode(&payload(desired, state)).unwrap();

        let result = reconciler(actuator.clone()).reconcile(record).await.unwrap();

        assert_eq!(
            result.is_some(),
            expect_change,
            "desired={desired} state={state} live={live}"
        );
        assert_eq!(actuator.writes().len(), usize::from(expect_change));

        if let Some(updated) = result {
            let block = updated.block("pump").unwrap();
            assert_eq!(block.state, block.desired_state);
            assert_eq!(block.state.as_bool(), Some(actuator.value()));
        }
    }
}

#[tokio::test]
async fn test_unrelated_blocks_untouched() {
    let actuator = shared(MockActuator::new(true));
    let raw = json!({
        "key": "svc1",
        "data": {
            "fridge": {"desiredState": 1, "state": 0},
            "pump": {"desiredState": 0, "state": 1, "claimedBy": "fermenter"},
            "sensor": {"value[degC]": 19.5},
            "notes": "free text"
        }
    });
    let record = decode(raw.to_string().as_bytes()).unwrap();

    let updated = reconciler(actuator.clone())
        .reconcile(record)
        .await
        .unwrap()
        .unwrap();

    let mut expected = raw.clone();
    expected["data"]["pump"]["state"] = json!(0);
    assert_eq!(as_json(&updated), expected);
    assert_eq!(actuator.writes(), vec![false]);
}

#[tokio::test]
async fn test_write_failure_aborts() {
    let actuator = shared(MockActuator::new(false));
    actuator.fail_writes(true);
    let record = decode(&payload("1", "null")).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert!(matches!(
        result,
        Err(BridgeError::ActuationFailure(ActuationError::Write(
            ActuatorError::Connect(_)
        )))
    ));
    assert!(!actuator.value());
}

#[tokio::test]
async fn test_confirmation_read_failure_aborts() {
    let actuator = shared(MockActuator::new(false));
    actuator.fail_next_reads(1);
    // Unknown state skips the drift check, so the first read is a confirmation
    let record = decode(&payload("1", "null")).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert!(matches!(
        result,
        Err(BridgeError::ActuationFailure(ActuationError::Confirm(_)))
    ));
    assert_eq!(actuator.writes(), vec![true]);
}

#[tokio::test]
async fn test_drift_check_failure_is_connect_error() {
    let actuator = shared(MockActuator::new(false));
    actuator.fail_next_reads(1);
    let record = decode(&payload("1", "1")).unwrap();

    let result = reconciler(actuator.clone()).reconcile(record).await;

    assert!(matches!(result, Err(BridgeError::ActuatorConnect(_))));
    assert!(actuator.writes().is_empty());
}

#[tokio::test]
async fn test_manual_override_is_corrected() {
    let actuator = shared(MockActuator::new(true));
    let reconciler = reconciler(actuator.clone());

    assert!(
        reconciler
            .reconcile(decode(&payload("1", "1")).unwrap())
            .await
            .unwrap()
            .is_none()
    );

    actuator.set_value(false);
    let updated = reconciler
        .reconcile(decode(&payload("1", "1")).unwrap())
        .await
        .unwrap();

    assert!(updated.is_some());
    assert_eq!(actuator.writes(), vec![true]);
    assert!(actuator.value());
}

#[tokio::test]
async fn test_shutdown_cancels_polling() {
    let actuator = shared(MockActuator::new(false).stuck());
    let (trigger, signal) = shutdown::channel();
    let reconciler = Reconciler::new(
        target(),
        RetryPolicy::fixed(Duration::from_secs(60), None),
        actuator.clone(),
        signal,
    );

    let task = tokio::spawn(async move {
        reconciler
            .reconcile(decode(&payload("1", "0")).unwrap())
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("polling should stop promptly")
        .unwrap();

    assert_eq!(
        result,
        Err(BridgeError::ActuationFailure(ActuationError::Cancelled))
    );
}
