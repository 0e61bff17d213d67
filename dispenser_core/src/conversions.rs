//! `From` implementations bridging `dispenser_config` types to engine types.

use std::time::Duration;

use crate::color::parse_hex_color;
use crate::config::{ControllerCfg, EngineCfg, ReconcilerCfg};
use crate::error::{DispenserError, Result};
use crate::state::DeviceState;

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&dispenser_config::Config> for ControllerCfg {
    fn from(c: &dispenser_config::Config) -> Self {
        Self {
            tick: Duration::from_millis(c.timing.tick_ms),
            substeps_per_pixel: c.led.substeps_per_pixel,
        }
    }
}

// ── ReconcilerCfg ────────────────────────────────────────────────────────────

impl From<&dispenser_config::Timing> for ReconcilerCfg {
    fn from(t: &dispenser_config::Timing) -> Self {
        Self {
            connect_timeout: Duration::from_millis(t.connect_timeout_ms),
            get_timeout: Duration::from_millis(t.get_timeout_ms),
            update_timeout: Duration::from_millis(t.update_timeout_ms),
            min_report_interval: Duration::from_millis(t.min_report_interval_ms),
        }
    }
}

// ── EngineCfg ────────────────────────────────────────────────────────────────

impl From<&dispenser_config::Config> for EngineCfg {
    fn from(c: &dispenser_config::Config) -> Self {
        Self {
            controller: ControllerCfg::from(c),
            reconciler: ReconcilerCfg::from(&c.timing),
        }
    }
}

// ── Initial state ────────────────────────────────────────────────────────────

/// Safe startup state with the `[initial]` overrides applied.
pub fn initial_state(init: &dispenser_config::Initial) -> Result<DeviceState> {
    let mut state = DeviceState::default();
    if let Some(raw) = init.color.as_deref() {
        state.led_ring_color = parse_hex_color(raw)
            .ok_or_else(|| DispenserError::Config(format!("initial.color {raw:?} is not #RRGGBB")))?;
    }
    if let Some(ms) = init.dispense_time_ms {
        state.dispense_duration_ms = ms;
    }
    Ok(state)
}
