//! WS2812 LED ring driven from an SPI MOSI line.
//!
//! At 2.4 MHz one SPI bit lasts ~417 ns, so every WS2812 data bit is sent as
//! three SPI bits: `110` for a one and `100` for a zero. Pixels go out in
//! GRB order; a run of zero bytes afterwards latches the frame.

/// SPI clock that makes the 3-bit encoding line up with WS2812 timing.
pub const SPI_CLOCK_HZ: u32 = 2_400_000;
/// Trailing low time (>50 us) expressed in SPI bytes.
pub const RESET_BYTES: usize = 32;

/// Append the SPI encoding of one color byte (3 bytes) to `out`.
#[inline]
fn encode_byte(byte: u8, out: &mut Vec<u8>) {
    let mut bits: u32 = 0;
    for i in (0..8).rev() {
        let pattern = if (byte >> i) & 1 == 1 { 0b110 } else { 0b100 };
        bits = (bits << 3) | pattern;
    }
    out.push((bits >> 16) as u8);
    out.push((bits >> 8) as u8);
    out.push(bits as u8);
}

/// Encode a full RGB frame for the wire, including the latch gap.
pub fn encode_frame(pixels: &[[u8; 3]], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(pixels.len() * 9 + RESET_BYTES);
    for [r, g, b] in pixels.iter().copied() {
        encode_byte(g, out);
        encode_byte(r, out);
        encode_byte(b, out);
    }
    out.resize(out.len() + RESET_BYTES, 0);
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use spi_ring::SpiRing;

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod spi_ring {
    use dispenser_traits::{HwResult, LedRing};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

    use super::{SPI_CLOCK_HZ, encode_frame};
    use crate::error::{HwError, Result};

    pub struct SpiRing {
        spi: Spi,
        pixels: Vec<[u8; 3]>,
        wire: Vec<u8>,
    }

    impl SpiRing {
        pub fn new(bus: u8, len: usize) -> Result<Self> {
            let bus = match bus {
                0 => Bus::Spi0,
                1 => Bus::Spi1,
                2 => Bus::Spi2,
                3 => Bus::Spi3,
                4 => Bus::Spi4,
                5 => Bus::Spi5,
                6 => Bus::Spi6,
                other => return Err(HwError::Spi(format!("no such SPI bus {other}"))),
            };
            let spi = Spi::new(bus, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
                .map_err(|e| HwError::Spi(format!("open led ring: {e}")))?;
            Ok(Self {
                spi,
                pixels: vec![[0, 0, 0]; len],
                wire: Vec::new(),
            })
        }
    }

    impl LedRing for SpiRing {
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
            encode_frame(&self.pixels, &mut self.wire);
            self.spi
                .write(&self.wire)
                .map_err(|e| HwError::Spi(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_full_bytes_use_expected_patterns() {
        let mut out = Vec::new();
        encode_byte(0x00, &mut out);
        assert_eq!(out, [0x92, 0x49, 0x24]);
        out.clear();
        encode_byte(0xFF, &mut out);
        assert_eq!(out, [0xDB, 0x6D, 0xB6]);
    }

    #[test]
    fn frame_is_grb_ordered_with_latch_gap() {
        let mut out = Vec::new();
        // Pure red: G=0, R=0xFF, B=0
        encode_frame(&[[0xFF, 0x00, 0x00]], &mut out);
        assert_eq!(out.len(), 9 + RESET_BYTES);
        assert_eq!(&out[0..3], &[0x92, 0x49, 0x24]);
        assert_eq!(&out[3..6], &[0xDB, 0x6D, 0xB6]);
        assert_eq!(&out[6..9], &[0x92, 0x49, 0x24]);
        assert!(out[9..].iter().all(|b| *b == 0));
    }
}
