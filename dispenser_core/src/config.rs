//! Runtime configuration for the engine.
//!
//! Separate from the TOML schema in `dispenser_config`; see `conversions`.
use std::time::Duration;

/// Actuation loop settings.
#[derive(Debug, Clone)]
pub struct ControllerCfg {
    /// Fixed tick period. The countdown uses measured time, not this value.
    pub tick: Duration,
    /// Interpolation frames per pixel of the chase animation.
    pub substeps_per_pixel: u32,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            substeps_per_pixel: 10,
        }
    }
}

/// Shadow call timeouts and report pacing.
#[derive(Debug, Clone)]
pub struct ReconcilerCfg {
    pub connect_timeout: Duration,
    pub get_timeout: Duration,
    pub update_timeout: Duration,
    /// Minimum spacing between two reports. Zero disables pacing.
    pub min_report_interval: Duration,
}

impl Default for ReconcilerCfg {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(450),
            get_timeout: Duration::from_millis(450),
            update_timeout: Duration::from_millis(300),
            min_report_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineCfg {
    pub controller: ControllerCfg,
    pub reconciler: ReconcilerCfg,
}
