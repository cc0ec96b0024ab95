// TiltGrid - Core Error Type

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Mux channel outside 0..=7. Only reachable through a programming error.
    #[error("invalid multiplexer channel {0} (expected 0..=7)")]
    InvalidChannel(u8),
    #[error("i2c transaction failed: {0}")]
    Io(ErrorKind),
    #[error("no sensor on the array came up")]
    NoSensors,
}

impl Error {
    /// Bus errors are reduced to their portable kind at the driver boundary.
    pub fn io<E: embedded_hal::i2c::Error>(err: E) -> Self {
        Error::Io(err.kind())
    }
}
