#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the dispenser firmware.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Only `[device]` and `[pins]` are required; every other table has defaults
//!   matching the stock 8-pixel ring and 100 ms actuation tick.
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Device {
    /// Name of the shadow this device mirrors.
    pub thing_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub motor_in1: u8,
    pub motor_in2: u8,
    /// Optional second motor driven in lockstep with the first.
    pub aux_motor_in1: Option<u8>,
    pub aux_motor_in2: Option<u8>,
    /// SPI bus carrying the WS2812 data line.
    pub led_spi_bus: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Actuation loop period (ms).
    pub tick_ms: u64,
    pub connect_timeout_ms: u64,
    pub get_timeout_ms: u64,
    pub update_timeout_ms: u64,
    /// Minimum spacing between two outbound reports (ms). 0 disables pacing.
    pub min_report_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            connect_timeout_ms: 450,
            get_timeout_ms: 450,
            update_timeout_ms: 300,
            min_report_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Led {
    pub ring_length: usize,
    /// Interpolation frames per pixel of the dispensing animation.
    pub substeps_per_pixel: u32,
    /// Builds without a ring set this to false; the ring is then never driven.
    pub enabled: bool,
}

impl Default for Led {
    fn default() -> Self {
        Self {
            ring_length: 8,
            substeps_per_pixel: 10,
            enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Startup overrides for the safe default device state.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Initial {
    /// `#RRGGBB`
    pub color: Option<String>,
    pub dispense_time_ms: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub device: Device,
    pub pins: Pins,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub led: Led,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub initial: Initial,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].bytes().all(|b| b.is_ascii_hexdigit())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.thing_name.trim().is_empty() {
            eyre::bail!("device.thing_name must not be empty");
        }

        // Pins
        if self.pins.motor_in1 == self.pins.motor_in2 {
            eyre::bail!("pins.motor_in1 and pins.motor_in2 must differ");
        }
        match (self.pins.aux_motor_in1, self.pins.aux_motor_in2) {
            (Some(a), Some(b)) if a == b => {
                eyre::bail!("pins.aux_motor_in1 and pins.aux_motor_in2 must differ")
            }
            (Some(_), None) | (None, Some(_)) => {
                eyre::bail!("pins.aux_motor_in1 and pins.aux_motor_in2 must be set together")
            }
            _ => {}
        }
        if let Some(bus) = self.pins.led_spi_bus
            && bus > 6
        {
            eyre::bail!("pins.led_spi_bus must be in [0, 6]");
        }

        // Timing
        if self.timing.tick_ms == 0 || self.timing.tick_ms > 1000 {
            eyre::bail!("timing.tick_ms must be in [1, 1000]");
        }
        if self.timing.connect_timeout_ms == 0 {
            eyre::bail!("timing.connect_timeout_ms must be >= 1");
        }
        if self.timing.get_timeout_ms == 0 {
            eyre::bail!("timing.get_timeout_ms must be >= 1");
        }
        if self.timing.update_timeout_ms == 0 {
            eyre::bail!("timing.update_timeout_ms must be >= 1");
        }
        if self.timing.min_report_interval_ms > 60 * 60 * 1000 {
            eyre::bail!("timing.min_report_interval_ms is unreasonably large (>1h)");
        }

        // LED ring
        if self.led.ring_length == 0 || self.led.ring_length > usize::from(u8::MAX) {
            eyre::bail!("led.ring_length must be in [1, 255]");
        }
        if self.led.substeps_per_pixel == 0 {
            eyre::bail!("led.substeps_per_pixel must be >= 1");
        }

        // Initial state
        if let Some(color) = &self.initial.color
            && !is_hex_color(color)
        {
            eyre::bail!("initial.color must be a #RRGGBB hex string, got {color:?}");
        }

        // Logging
        if let Some(rot) = &self.logging.rotation
            && !matches!(rot.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
