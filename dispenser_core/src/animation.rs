//! Ring frames: the static count/color snapshot and the dispensing chase.

use crate::state::{Rgb, Visual};

/// Brightness of the trailing pixel and floor of the fading head.
const DIM: f32 = 0.01;

/// HSV to RGB. `h` in degrees (any value, wrapped), `s` and `v` in [0, 1].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |f: f32| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb::new(to_u8(r), to_u8(g), to_u8(b))
}

/// Pixels of the idle snapshot: the first `count` pixels (clamped to the
/// ring) in the configured color when enabled, everything else dark.
pub fn snapshot(visual: &Visual, ring_len: usize) -> Vec<Rgb> {
    let mut frame = vec![Rgb::BLACK; ring_len];
    if visual.enabled {
        let lit = usize::from(visual.count).min(ring_len);
        frame[..lit].fill(visual.color);
    }
    frame
}

/// Rotating rainbow chase shown while the motor runs.
#[derive(Debug, Clone, Copy)]
pub struct Chase {
    ring_len: usize,
    substeps: u32,
}

impl Chase {
    pub fn new(ring_len: usize, substeps_per_pixel: u32) -> Self {
        Self {
            ring_len,
            substeps: substeps_per_pixel.max(1),
        }
    }

    /// Frames per revolution.
    pub fn period(&self) -> u32 {
        u32::try_from(self.ring_len)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.substeps)
            .max(1)
    }

    /// Pixels for frame `step` (taken modulo the period).
    pub fn frame(&self, step: u32) -> Vec<Rgb> {
        let mut frame = vec![Rgb::BLACK; self.ring_len];
        if self.ring_len == 0 {
            return frame;
        }
        let step = step % self.period();
        let hue = 360.0 * step as f32 / self.period() as f32;
        let head = (step / self.substeps) as usize;
        let frac = (step % self.substeps) as f32 / self.substeps as f32;

        let len = self.ring_len;
        let trail = (head + len - 1) % len;
        let next = (head + 1) % len;
        // Later writes win when the ring is too short for distinct pixels.
        frame[trail] = hsv_to_rgb(hue, 1.0, DIM);
        frame[next] = hsv_to_rgb(hue, 1.0, frac.max(DIM));
        frame[head] = hsv_to_rgb(hue, 1.0, (1.0 - frac).max(DIM));
        frame
    }
}
