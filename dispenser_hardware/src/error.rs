use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("pixel {index} out of range for ring of {len}")]
    PixelOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, HwError>;
