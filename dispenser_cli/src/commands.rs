//! Command bodies: engine startup, the simulated dispense, and self-check.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dispenser_core::{DispenserError, EngineCfg, Result, initial_state};
use dispenser_hardware::{SimShadowHandle, SimulatedShadow};
use dispenser_traits::MonotonicClock;
use eyre::WrapErr;
use serde_json::{Value, json};

use crate::device;

/// Start the engine and block on it.
///
/// No network transport is linked into this binary, so the engine talks to
/// the in-memory shadow; motor and ring follow the build's backend.
pub fn run(cfg: &dispenser_config::Config) -> Result<()> {
    let engine = EngineCfg::from(cfg);
    let initial = initial_state(&cfg.initial)?;
    let (motor, ring) = device::build(cfg)?;
    tracing::info!(thing = %cfg.device.thing_name, "starting engine");
    let running = dispenser_core::start(
        SimulatedShadow::new(),
        motor,
        ring,
        MonotonicClock::new(),
        &engine,
        initial,
    )?;
    running.join()
}

pub struct SimulateArgs {
    pub duration_ms: u32,
    pub request_id: String,
    pub count: Option<u8>,
    pub color: Option<String>,
    pub timeout: Duration,
}

/// Cloud timestamp for the injected request, like the real service's.
fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn visual_patch(args: &SimulateArgs) -> Option<Value> {
    if args.count.is_none() && args.color.is_none() {
        return None;
    }
    let mut ring = serde_json::Map::new();
    if let Some(n) = args.count {
        ring.insert("count".into(), json!(n));
    }
    if let Some(c) = &args.color {
        ring.insert("color".into(), json!(c));
    }
    Some(json!({"led": "on", "led_ring": ring}))
}

fn wait_for_response(cloud: &SimShadowHandle, request_id: &str, timeout: Duration) -> Result<Value> {
    let deadline = Instant::now() + timeout;
    loop {
        let reported = cloud.reported();
        let done = reported
            .get("response")
            .and_then(|r| r.get("requestId"))
            .and_then(Value::as_str)
            == Some(request_id);
        if done {
            return Ok(reported);
        }
        if Instant::now() >= deadline {
            return Err(DispenserError::Runtime(format!(
                "no completion report within {} ms",
                timeout.as_millis()
            ))
            .into());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Run one dispense end to end on simulated hardware and return the
/// `reported` section that acknowledged it.
pub fn simulate(cfg: &dispenser_config::Config, args: &SimulateArgs) -> Result<Value> {
    let engine = EngineCfg::from(cfg);
    let initial = initial_state(&cfg.initial)?;
    let (motor, ring) = device::simulated(cfg);
    let shadow = SimulatedShadow::new();
    let cloud = shadow.handle();

    let _running = dispenser_core::start(shadow, motor, ring, MonotonicClock::new(), &engine, initial)
        .wrap_err("simulated engine failed to start")?;

    if let Some(patch) = visual_patch(args) {
        cloud.set_desired(patch);
    }
    // The device keeps at most 9 bytes of the id; match on what it echoes.
    let echoed = dispenser_core::util::truncate_utf8(&args.request_id, dispenser_core::state::REQUEST_ID_MAX);
    tracing::info!(request_id = %args.request_id, duration_ms = args.duration_ms, "injecting dispense request");
    cloud.request_dispense(&args.request_id, unix_ms(), args.duration_ms);

    wait_for_response(&cloud, echoed, args.timeout)
}

/// Validate what can be validated without running: the config, the
/// derived engine settings and the backends.
pub fn self_check(cfg: &dispenser_config::Config) -> Result<()> {
    let _ = EngineCfg::from(cfg);
    initial_state(&cfg.initial)?;
    let (_motor, ring) = device::build(cfg)?;
    tracing::info!(ring_len = ring.len(), "backends ok");
    Ok(())
}
