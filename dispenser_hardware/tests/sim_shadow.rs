use std::time::Duration;

use crossbeam_channel::unbounded;
use dispenser_hardware::SimulatedShadow;
use dispenser_traits::{RemoteError, ShadowClient};
use rstest::rstest;
use serde_json::{Value, json};

const T: Duration = Duration::from_millis(50);

fn connected() -> (SimulatedShadow, crossbeam_channel::Receiver<String>) {
    let mut shadow = SimulatedShadow::new();
    let (tx, rx) = unbounded();
    shadow.connect(T).expect("connect");
    shadow.register_delta(tx, T).expect("register");
    (shadow, rx)
}

fn parse(s: &str) -> Value {
    serde_json::from_str(s).expect("valid json")
}

#[test]
fn register_before_connect_is_rejected() {
    let mut shadow = SimulatedShadow::new();
    let (tx, _rx) = unbounded();
    assert!(matches!(
        shadow.register_delta(tx, T),
        Err(RemoteError::Rejected(_))
    ));
}

#[test]
fn desired_change_pushes_delta() {
    let (shadow, rx) = connected();
    let cloud = shadow.handle();
    cloud.set_reported(json!({"led": "on"}));
    cloud.set_desired(json!({"led": "on", "led_ring": {"count": 4}}));

    let delta = parse(&rx.try_recv().expect("delta pushed"));
    assert_eq!(delta["state"], json!({"led_ring": {"count": 4}}));
}

#[test]
fn desired_equal_to_reported_pushes_nothing() {
    let (shadow, rx) = connected();
    let cloud = shadow.handle();
    cloud.set_reported(json!({"led": "off"}));
    cloud.set_desired(json!({"led": "off"}));
    assert!(rx.try_recv().is_err());
}

#[test]
fn get_returns_both_sections() {
    let (mut shadow, _rx) = connected();
    let cloud = shadow.handle();
    cloud.set_reported(json!({"dispense_time_ms": 100}));
    cloud.request_dispense("0001-0002", 1000, 1500);

    let doc = parse(&shadow.get(T).expect("get"));
    assert_eq!(doc["state"]["reported"]["dispense_time_ms"], 100);
    assert_eq!(doc["state"]["desired"]["dispense_time_ms"], 1500);
    assert_eq!(doc["state"]["desired"]["request"]["requestId"], "0001-0002");
}

#[test]
fn update_with_null_request_clears_trigger() {
    let (mut shadow, rx) = connected();
    let cloud = shadow.handle();
    cloud.request_dispense("abc", 1000, 1500);
    let _ = rx.try_recv();

    let ack = json!({
        "state": {
            "reported": {"dispense_time_ms": 1500},
            "desired": {"request": null}
        },
        "clientToken": "token-1"
    });
    shadow.update(&ack.to_string(), T).expect("update");

    assert_eq!(cloud.desired(), json!({"dispense_time_ms": 1500}));
    assert_eq!(cloud.reported(), json!({"dispense_time_ms": 1500}));
    // Nothing left to reconcile, so no delta.
    assert!(rx.try_recv().is_err());
    assert_eq!(cloud.updates().len(), 1);
}

#[rstest]
#[case("not json")]
#[case("{\"clientToken\":\"token-1\"}")]
fn malformed_updates_are_rejected(#[case] doc: &str) {
    let (mut shadow, _rx) = connected();
    assert!(matches!(
        shadow.update(doc, T),
        Err(RemoteError::Rejected(_))
    ));
}

#[test]
fn injected_failures_are_consumed() {
    let (mut shadow, _rx) = connected();
    let cloud = shadow.handle();
    cloud.fail_next_gets(1);
    cloud.fail_next_updates(2);

    assert_eq!(shadow.get(T), Err(RemoteError::Timeout));
    assert!(shadow.get(T).is_ok());

    let doc = json!({"state": {"reported": {"led": "on"}}}).to_string();
    assert_eq!(shadow.update(&doc, T), Err(RemoteError::Timeout));
    assert_eq!(shadow.update(&doc, T), Err(RemoteError::Timeout));
    assert!(shadow.update(&doc, T).is_ok());
}

#[test]
fn connect_failure_is_reported() {
    let mut shadow = SimulatedShadow::new();
    shadow.handle().fail_connect(true);
    assert_eq!(shadow.connect(T), Err(RemoteError::Timeout));
}
