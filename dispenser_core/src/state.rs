//! The device state mirrored from the shadow.

use std::fmt;

/// Longest request token the device keeps (bytes).
pub const REQUEST_ID_MAX: usize = 9;

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Upper-case `#RRGGBB`, the form the shadow stores.
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Authoritative device state.
///
/// Owned by the reconciler; the actuation controller only ever sees copies
/// delivered through the state channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// Requested actuation length.
    pub dispense_duration_ms: u32,
    /// Lit pixel count. Clamped to the ring length only when drawn.
    pub led_ring_count: u8,
    pub led_ring_color: Rgb,
    /// Whether the ring is shown at all.
    pub led_enabled: bool,
    /// A dispense request is pending. Re-derived from every fragment.
    pub dispense_requested: bool,
    /// Token echoed back on completion, at most `REQUEST_ID_MAX` bytes.
    pub request_id: String,
    /// Request timestamp as supplied by the cloud.
    pub cloud_start_ms: u32,
    /// Device tick count when the motor was started.
    pub local_start_ms: u32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            dispense_duration_ms: 0,
            led_ring_count: 0,
            led_ring_color: Rgb::WHITE,
            led_enabled: false,
            dispense_requested: false,
            request_id: String::new(),
            cloud_start_ms: 0,
            local_start_ms: 0,
        }
    }
}

impl DeviceState {
    /// The part of the state the idle ring displays.
    pub fn visual(&self) -> Visual {
        Visual {
            color: self.led_ring_color,
            count: self.led_ring_count,
            enabled: self.led_enabled,
        }
    }

    /// Identity of the request carried by this state.
    pub fn request_key(&self) -> RequestKey {
        RequestKey {
            request_id: self.request_id.clone(),
            cloud_start_ms: self.cloud_start_ms,
        }
    }
}

/// Static ring snapshot; equality decides whether a redraw is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visual {
    pub color: Rgb,
    pub count: u8,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
    pub request_id: String,
    pub cloud_start_ms: u32,
}
