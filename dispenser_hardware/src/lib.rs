//! Backends for the dispenser seams.
//!
//! Simulated motor, LED ring and device shadow are always built; the GPIO
//! H-bridge motor and the SPI-driven WS2812 ring need the `hardware` feature.
pub mod error;
pub mod shadow;
pub mod ws2812;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod h_bridge;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use h_bridge::HBridgeMotor;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use ws2812::SpiRing;

pub use shadow::{SimShadowHandle, SimulatedShadow};

use dispenser_traits::{HwResult, LedRing, Motor};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::HwError;

/// Observer side of a `SimulatedMotor`; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct MotorProbe {
    running: Arc<AtomicBool>,
    forwards: Arc<AtomicUsize>,
    brakes: Arc<AtomicUsize>,
}

impl MotorProbe {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
    pub fn forward_count(&self) -> usize {
        self.forwards.load(Ordering::Relaxed)
    }
    pub fn brake_count(&self) -> usize {
        self.brakes.load(Ordering::Relaxed)
    }
}

/// Simulated motor implementation
#[derive(Debug, Default)]
pub struct SimulatedMotor {
    probe: MotorProbe,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> MotorProbe {
        self.probe.clone()
    }
}

impl Motor for SimulatedMotor {
    fn forward(&mut self) -> HwResult {
        self.probe.running.store(true, Ordering::Relaxed);
        self.probe.forwards.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("motor forward (simulated)");
        Ok(())
    }

    fn brake(&mut self) -> HwResult {
        self.probe.running.store(false, Ordering::Relaxed);
        self.probe.brakes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("motor brake (simulated)");
        Ok(())
    }
}

/// Observer side of a `SimulatedLedRing`: the last latched frame and how
/// many times the ring was shown.
#[derive(Debug, Clone, Default)]
pub struct RingProbe {
    latched: Arc<Mutex<Vec<[u8; 3]>>>,
    shows: Arc<AtomicUsize>,
}

impl RingProbe {
    /// Pixels as they were at the last `show()`.
    pub fn frame(&self) -> Vec<[u8; 3]> {
        self.latched
            .lock()
            .map(|g| g.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    /// Number of lit (non-black) pixels in the latched frame.
    pub fn lit(&self) -> usize {
        self.frame().iter().filter(|px| **px != [0, 0, 0]).count()
    }

    pub fn show_count(&self) -> usize {
        self.shows.load(Ordering::Relaxed)
    }
}

/// Simulated LED ring with a fixed pixel buffer.
#[derive(Debug)]
pub struct SimulatedLedRing {
    pixels: Vec<[u8; 3]>,
    probe: RingProbe,
}

impl SimulatedLedRing {
    pub fn new(len: usize) -> Self {
        let probe = RingProbe {
            latched: Arc::new(Mutex::new(vec![[0, 0, 0]; len])),
            shows: Arc::new(AtomicUsize::new(0)),
        };
        Self {
            pixels: vec![[0, 0, 0]; len],
            probe,
        }
    }

    pub fn probe(&self) -> RingProbe {
        self.probe.clone()
    }
}

impl LedRing for SimulatedLedRing {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HwResult {
        let len = self.pixels.len();
        let px = self
            .pixels
            .get_mut(index)
            .ok_or(HwError::PixelOutOfRange { index, len })?;
        *px = [r, g, b];
        Ok(())
    }

    fn show(&mut self) -> HwResult {
        match self.probe.latched.lock() {
            Ok(mut latched) => latched.clone_from(&self.pixels),
            Err(p) => p.into_inner().clone_from(&self.pixels),
        }
        self.probe.shows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
