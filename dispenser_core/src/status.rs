//! Outcome of one actuation tick.

/// Public status of a single tick of the actuation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationStatus {
    /// Nothing to dispense; the ring shows the static snapshot.
    Idle,
    /// Motor running; `remaining_ms` left on the countdown.
    Dispensing { remaining_ms: u32 },
    /// Countdown reached zero this tick; motor braked and completion raised.
    Completed,
}
