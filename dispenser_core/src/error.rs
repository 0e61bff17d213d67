use dispenser_traits::RemoteError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DispenserError {
    /// Could not reach the shadow service. Fatal: the device restarts.
    #[error("shadow connect failed: {0}")]
    Connect(RemoteError),
    /// Connected, but the delta subscription was refused. Fatal as well.
    #[error("delta registration failed: {0}")]
    Register(RemoteError),
    /// A get or update that failed after startup; retried on the next trigger.
    #[error("shadow call failed: {0}")]
    Remote(RemoteError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
