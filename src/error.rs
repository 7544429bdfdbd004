//! Error surface for connection establishment.
//!
//! Per-attempt failures inside a race are absorbed; only whole-call failures
//! reach the caller, carrying the last underlying OS error.
use std::io;
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = ConnectError> = std::result::Result<T, E>;

/// Errors returned by [`create_connection`](crate::create_connection) and friends.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Selector or socket bookkeeping failed outside any single attempt.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The OS resolver rejected the destination, or returned nothing usable.
    #[error("resolve: {0}")]
    Resolve(io::Error),

    /// Every attempted endpoint failed; carries the last connect error seen.
    #[error("connect: {0}")]
    Connect(io::Error),

    /// The overall deadline elapsed before any attempt completed or failed.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl From<ConnectError> for io::Error {
    fn from(e: ConnectError) -> io::Error {
        match e {
            ConnectError::Io(e) | ConnectError::Resolve(e) | ConnectError::Connect(e) => e,
            ConnectError::Timeout(d) => {
                io::Error::new(io::ErrorKind::TimedOut, format!("timeout after {d:?}"))
            }
        }
    }
}
