//! Reconciler and controller wired together over the in-memory shadow,
//! stepped by hand on a test clock.
use std::time::Duration;

use dispenser_core::{
    ActuationStatus, Controller, ControllerCfg, DeviceState, DispenserError, EngineCfg,
    Reconciler, ReconcilerCfg, notifier, state_channel,
};
use dispenser_hardware::{MotorProbe, SimShadowHandle, SimulatedLedRing, SimulatedMotor, SimulatedShadow};
use dispenser_traits::clock::test_clock::TestClock;
use dispenser_traits::{Clock, HwResult, Motor, MonotonicClock};
use serde_json::{Value, json};

type Ctl = Controller<SimulatedMotor, SimulatedLedRing, TestClock>;
type Rec = Reconciler<SimulatedShadow, TestClock>;

struct Bench {
    rec: Rec,
    ctl: Ctl,
    clock: TestClock,
    cloud: SimShadowHandle,
    motor: MotorProbe,
}

fn bench_with(shadow: SimulatedShadow, min_report_interval: Duration) -> Bench {
    let cloud = shadow.handle();
    let clock = TestClock::new();
    let epoch = clock.now();
    let (publisher, inbox) = state_channel();
    let (n, listener) = notifier();
    let cfg = ReconcilerCfg {
        min_report_interval,
        ..ReconcilerCfg::default()
    };
    let mut rec = Reconciler::connect(
        shadow,
        clock.clone(),
        epoch,
        cfg,
        DeviceState::default(),
        publisher,
        listener,
    )
    .expect("connect");
    rec.prime();
    let motor = SimulatedMotor::new();
    let probe = motor.probe();
    let ctl = Controller::new(
        motor,
        SimulatedLedRing::new(8),
        clock.clone(),
        epoch,
        inbox,
        n,
        &ControllerCfg::default(),
    );
    Bench {
        rec,
        ctl,
        clock,
        cloud,
        motor: probe,
    }
}

fn bench() -> Bench {
    bench_with(SimulatedShadow::new(), Duration::ZERO)
}

impl Bench {
    /// Handle everything the reconciler has queued.
    fn pump(&mut self) {
        while self.rec.step(Some(Duration::from_millis(20))) {}
    }

    /// One controller tick `ms` after the previous one, then pump.
    fn tick(&mut self, ms: u64) -> ActuationStatus {
        self.clock.advance_ms(ms);
        let status = self.ctl.tick();
        self.pump();
        status
    }

    fn reports(&self) -> Vec<Value> {
        self.cloud
            .updates()
            .iter()
            .map(|u| serde_json::from_str(u).expect("report is JSON"))
            .collect()
    }
}

#[test]
fn dispense_round_trip_acknowledges_and_reports_success() {
    let mut b = bench();
    b.tick(0);
    let initial_reports = b.reports().len();
    assert_eq!(initial_reports, 1, "initial snapshot is reported");

    b.cloud.request_dispense("abc123", 1000, 1500);
    b.pump();
    assert!(b.rec.state().dispense_requested);

    assert_eq!(b.tick(100), ActuationStatus::Dispensing { remaining_ms: 1500 });
    assert!(b.motor.is_running());
    let mut status = ActuationStatus::Idle;
    for _ in 0..15 {
        status = b.tick(100);
    }
    assert_eq!(status, ActuationStatus::Completed);
    assert!(!b.motor.is_running());

    let reports = b.reports();
    assert_eq!(reports.len(), initial_reports + 1);
    let last = reports.last().expect("completion report");
    assert_eq!(last["state"]["desired"], json!({"request": null}));
    assert_eq!(
        last["state"]["reported"]["response"],
        json!({"command": "dispense", "requestId": "abc123", "result": "success", "timestamp": 2500})
    );
    assert_eq!(last["clientToken"], "token-1600");

    // Acknowledged: the trigger is gone from the cloud document.
    assert!(b.cloud.desired().get("request").is_none());
    assert!(!b.rec.state().dispense_requested);

    // Nothing re-fires.
    for _ in 0..5 {
        assert_eq!(b.tick(100), ActuationStatus::Idle);
    }
    assert_eq!(b.motor.forward_count(), 1);
    assert_eq!(b.reports().len(), initial_reports + 1);
}

#[test]
fn startup_get_lets_desired_win_over_reported() {
    let shadow = SimulatedShadow::new();
    let cloud = shadow.handle();
    cloud.set_reported(json!({"led": "off", "led_ring": {"count": 1, "color": "#010203"}, "dispense_time_ms": 700}));
    cloud.set_desired(json!({"led": "on", "led_ring": {"count": 6}}));

    let mut b = bench_with(shadow, Duration::ZERO);
    let s = b.rec.state().clone();
    assert!(s.led_enabled);
    assert_eq!(s.led_ring_count, 6);
    assert_eq!(s.led_ring_color.to_string(), "#010203");
    assert_eq!(s.dispense_duration_ms, 700);

    b.tick(0);
    let reported = b.cloud.reported();
    assert_eq!(reported["led"], "on");
    assert_eq!(reported["led_ring"], json!({"count": 6, "color": "#010203"}));
}

#[test]
fn visual_change_is_reported_once() {
    let mut b = bench();
    b.tick(0);
    let before = b.reports().len();

    b.cloud.set_desired(json!({"led": "on", "led_ring": {"count": 3, "color": "#00ff00"}}));
    b.pump();
    b.tick(100);
    b.tick(100);
    b.tick(100);

    let reports = b.reports();
    assert_eq!(reports.len(), before + 1);
    assert_eq!(
        reports[before]["state"]["reported"]["led_ring"],
        json!({"count": 3, "color": "#00FF00"})
    );
}

#[test]
fn failed_update_is_retried_on_next_delta() {
    let mut b = bench();
    b.tick(0);
    let before = b.reports().len();

    b.cloud.request_dispense("r-9", 50, 100);
    b.pump();
    b.cloud.fail_next_updates(1);
    b.tick(100);
    assert_eq!(b.tick(100), ActuationStatus::Completed);
    assert_eq!(b.reports().len(), before, "update timed out");
    assert_eq!(b.rec.pending_completion().map(|j| j.request_id.as_str()), Some("r-9"));

    // Nothing retries on its own.
    b.pump();
    assert_eq!(b.reports().len(), before);

    b.cloud.set_desired(json!({"dispense_time_ms": 100}));
    b.pump();
    let reports = b.reports();
    assert_eq!(reports.len(), before + 1);
    assert_eq!(reports[before]["state"]["reported"]["response"]["requestId"], "r-9");
    assert!(b.rec.pending_completion().is_none());
}

#[test]
fn reports_are_paced_not_dropped() {
    let mut b = bench_with(SimulatedShadow::new(), Duration::from_millis(1000));
    b.tick(0);
    assert_eq!(b.reports().len(), 1);

    b.cloud.set_desired(json!({"led": "on", "led_ring": {"count": 2}}));
    b.pump();
    b.tick(100);
    assert_eq!(b.reports().len(), 1, "too soon after the previous report");
    assert!(b.rec.has_pending_report());
    let delay = b.rec.report_delay().expect("report scheduled");
    assert_eq!(delay, Duration::from_millis(900));

    // A second change before the deadline folds into the same report.
    b.cloud.set_desired(json!({"led_ring": {"count": 5}}));
    b.pump();
    b.tick(100);
    assert_eq!(b.reports().len(), 1);

    b.clock.advance_ms(800);
    b.rec.flush_due();
    let reports = b.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1]["state"]["reported"]["led_ring"]["count"], 5);
    assert!(!b.rec.has_pending_report());
}

#[test]
fn completions_inside_one_pacing_window_share_one_report() {
    let mut b = bench_with(SimulatedShadow::new(), Duration::from_millis(1000));
    b.tick(0);
    let before = b.reports().len();

    for (id, ts) in [("one", 100), ("two", 200)] {
        b.cloud.request_dispense(id, ts, 0);
        b.pump();
        assert_eq!(b.tick(100), ActuationStatus::Completed);
    }
    assert_eq!(b.reports().len(), before, "still inside the pacing window");
    assert_eq!(b.rec.pending_completion().map(|j| j.request_id.as_str()), Some("two"));

    b.clock.advance_ms(1000);
    b.rec.flush_due();
    let reports = b.reports();
    assert_eq!(reports.len(), before + 1);
    assert_eq!(reports[before]["state"]["reported"]["response"]["requestId"], "two");
    assert!(!b.rec.has_pending_report());
    assert_eq!(b.rec.report_delay(), None);
}

#[test]
fn request_without_id_after_a_served_one_still_dispenses() {
    let mut b = bench();
    b.tick(0);
    b.cloud.request_dispense("abc", 100, 0);
    b.pump();
    assert_eq!(b.tick(100), ActuationStatus::Completed);
    assert_eq!(b.motor.forward_count(), 1);

    b.cloud.set_desired(json!({"request": {"command": "dispense"}}));
    b.pump();
    assert_eq!(b.rec.state().request_id, "");
    assert_eq!(b.tick(100), ActuationStatus::Completed);
    assert_eq!(b.motor.forward_count(), 2);
}

#[test]
fn get_failure_at_startup_is_retried_on_next_delta() {
    let shadow = SimulatedShadow::new();
    let cloud = shadow.handle();
    cloud.set_reported(json!({"dispense_time_ms": 4321}));
    cloud.fail_next_gets(1);

    let mut b = bench_with(shadow, Duration::ZERO);
    assert_eq!(b.rec.state().dispense_duration_ms, 0, "startup defaults kept");

    b.cloud.set_desired(json!({"led": "on"}));
    b.pump();
    let s = b.rec.state();
    assert_eq!(s.dispense_duration_ms, 4321);
    assert!(s.led_enabled);
}

#[test]
fn malformed_inbound_documents_are_ignored() {
    let shadow = SimulatedShadow::new();
    let mut b = bench_with(shadow, Duration::ZERO);
    let before = b.rec.state().clone();
    b.rec.on_delta("{not json");
    b.rec.on_delta(r#"{"version": 4}"#);
    assert_eq!(b.rec.state(), &before);
}

#[test]
fn connect_and_register_failures_are_fatal() {
    let (publisher, _inbox) = state_channel();
    let (_n, listener) = notifier();
    let shadow = SimulatedShadow::new();
    shadow.handle().fail_connect(true);
    let clock = TestClock::new();
    let err = Reconciler::connect(
        shadow,
        clock.clone(),
        clock.now(),
        ReconcilerCfg::default(),
        DeviceState::default(),
        publisher,
        listener,
    )
    .err()
    .expect("connect must fail");
    assert!(matches!(
        err.downcast_ref::<DispenserError>(),
        Some(DispenserError::Connect(_))
    ));

    let shadow = SimulatedShadow::new();
    shadow.handle().fail_register(true);
    let err = dispenser_core::start(
        shadow,
        SimulatedMotor::new(),
        SimulatedLedRing::new(8),
        MonotonicClock::new(),
        &EngineCfg::default(),
        DeviceState::default(),
    )
    .err()
    .expect("register must fail");
    assert!(matches!(
        err.downcast_ref::<DispenserError>(),
        Some(DispenserError::Register(_))
    ));
}

#[test]
fn closed_notifier_stops_waking_the_reconciler() {
    let (publisher, _inbox) = state_channel();
    let (n, listener) = notifier();
    let clock = TestClock::new();
    let mut rec = Reconciler::connect(
        SimulatedShadow::new(),
        clock.clone(),
        clock.now(),
        ReconcilerCfg::default(),
        DeviceState::default(),
        publisher,
        listener,
    )
    .expect("connect");
    drop(n);

    assert!(rec.step(Some(Duration::from_millis(100))));
    assert!(rec.is_orphaned());
    // Nothing left to wake on: the next step waits out its timeout.
    let started = std::time::Instant::now();
    assert!(!rec.step(Some(Duration::from_millis(50))));
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn threaded_engine_completes_a_dispense() {
    let shadow = SimulatedShadow::new();
    let cloud = shadow.handle();
    let mut cfg = EngineCfg::default();
    cfg.controller.tick = Duration::from_millis(10);
    cfg.reconciler.min_report_interval = Duration::ZERO;

    let running = dispenser_core::start(
        shadow,
        SimulatedMotor::new(),
        SimulatedLedRing::new(8),
        MonotonicClock::new(),
        &cfg,
        DeviceState::default(),
    )
    .expect("engine starts");

    cloud.request_dispense("t-1", 5000, 120);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let response = loop {
        let r = cloud.reported();
        if let Some(resp) = r.get("response") {
            break resp.clone();
        }
        assert!(std::time::Instant::now() < deadline, "no completion report");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(response["requestId"], "t-1");
    assert_eq!(response["result"], "success");
    let ts = response["timestamp"].as_u64().expect("numeric timestamp");
    assert!(ts >= 5120, "timestamp {ts} is before the dispense could end");
    assert!(!running.is_finished());
}

struct FaultyMotor;

impl Motor for FaultyMotor {
    fn forward(&mut self) -> HwResult {
        panic!("motor driver fault");
    }

    fn brake(&mut self) -> HwResult {
        Ok(())
    }
}

#[test]
fn actuation_panic_surfaces_from_join() {
    let shadow = SimulatedShadow::new();
    let cloud = shadow.handle();
    let mut cfg = EngineCfg::default();
    cfg.controller.tick = Duration::from_millis(10);

    let running = dispenser_core::start(
        shadow,
        FaultyMotor,
        SimulatedLedRing::new(8),
        MonotonicClock::new(),
        &cfg,
        DeviceState::default(),
    )
    .expect("engine starts");
    cloud.request_dispense("boom", 1, 500);

    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(running.join());
    });
    let joined = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("join returns once the actuation loop dies");
    let err = joined.expect_err("a dead loop is an error");
    assert!(matches!(
        err.downcast_ref::<DispenserError>(),
        Some(DispenserError::Runtime(msg)) if msg == "actuation loop panicked"
    ));
}
