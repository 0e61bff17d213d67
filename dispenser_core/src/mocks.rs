//! Stand-ins for absent hardware.

use dispenser_traits::{HwResult, LedRing};

/// Ring of length zero, for builds without an LED ring. The controller
/// never addresses a pixel on it, and `show` does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRing;

impl LedRing for NoRing {
    fn len(&self) -> usize {
        0
    }

    fn set_pixel(&mut self, index: usize, _r: u8, _g: u8, _b: u8) -> HwResult {
        Err(format!("no LED ring fitted (pixel {index})").into())
    }

    fn show(&mut self) -> HwResult {
        Ok(())
    }
}
