//! Small numeric and text helpers shared by the reconciler and controller.

use std::time::Instant;

/// Milliseconds from `earlier` to `now`, saturating at both ends of `u32`.
#[inline]
pub fn elapsed_ms_u32(now: Instant, earlier: Instant) -> u32 {
    let ms = now.saturating_duration_since(earlier).as_millis();
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// Reduce a cloud timestamp to the device's 32-bit time.
///
/// Integers wrap modulo 2^32; floats are truncated toward zero first.
/// Negative or non-finite values yield `None`.
#[inline]
pub fn wrap_u32_f64(x: f64) -> Option<u32> {
    if !x.is_finite() || x < 0.0 {
        return None;
    }
    // `as u64` saturates above u64::MAX, which cannot occur for realistic input.
    Some(x.trunc() as u64 as u32)
}

/// Truncate `s` to at most `max` bytes without splitting a character.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
