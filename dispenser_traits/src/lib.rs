pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;
use thiserror::Error;

/// Error type returned across the hardware trait boundary.
pub type HwResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dispense motor driven through an H-bridge.
pub trait Motor {
    /// Run the motor in the dispensing direction.
    fn forward(&mut self) -> HwResult;
    /// Stop abruptly (both bridge legs high).
    fn brake(&mut self) -> HwResult;
}

/// Addressable LED ring with a fixed-length pixel buffer.
///
/// `set_pixel` only writes the buffer; nothing is visible until `show`.
pub trait LedRing {
    /// Number of pixels on the ring.
    fn len(&self) -> usize;
    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HwResult;
    fn show(&mut self) -> HwResult;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blank the first `count` pixels and latch the buffer.
    fn turn_off(&mut self, count: usize) -> HwResult {
        for i in 0..count.min(self.len()) {
            self.set_pixel(i, 0, 0, 0)?;
        }
        self.show()
    }
}

/// Failure of a remote device-shadow operation.
///
/// Together with `Ok` this is the tri-state outcome every remote call reports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote operation timed out")]
    Timeout,
    #[error("remote operation rejected: {0}")]
    Rejected(String),
    #[error("remote transport disconnected")]
    Disconnected,
}

/// Where a transport delivers inbound delta documents (raw JSON text).
pub type DeltaSink = crossbeam_channel::Sender<String>;

/// Client for the cloud-hosted device shadow.
///
/// All calls are bounded by the given timeout. Deltas are pushed
/// asynchronously into the registered sink by the transport.
pub trait ShadowClient {
    fn connect(&mut self, timeout: Duration) -> Result<(), RemoteError>;
    fn register_delta(&mut self, sink: DeltaSink, timeout: Duration) -> Result<(), RemoteError>;
    /// Fetch the full shadow document.
    fn get(&mut self, timeout: Duration) -> Result<String, RemoteError>;
    fn update(&mut self, document: &str, timeout: Duration) -> Result<(), RemoteError>;
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn forward(&mut self) -> HwResult {
        (**self).forward()
    }
    fn brake(&mut self) -> HwResult {
        (**self).brake()
    }
}

impl<T: LedRing + ?Sized> LedRing for Box<T> {
    fn len(&self) -> usize {
        (**self).len()
    }
    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HwResult {
        (**self).set_pixel(index, r, g, b)
    }
    fn show(&mut self) -> HwResult {
        (**self).show()
    }
}

impl<T: ShadowClient + ?Sized> ShadowClient for Box<T> {
    fn connect(&mut self, timeout: Duration) -> Result<(), RemoteError> {
        (**self).connect(timeout)
    }
    fn register_delta(&mut self, sink: DeltaSink, timeout: Duration) -> Result<(), RemoteError> {
        (**self).register_delta(sink, timeout)
    }
    fn get(&mut self, timeout: Duration) -> Result<String, RemoteError> {
        (**self).get(timeout)
    }
    fn update(&mut self, document: &str, timeout: Duration) -> Result<(), RemoteError> {
        (**self).update(document, timeout)
    }
}
