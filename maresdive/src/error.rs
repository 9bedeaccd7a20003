//! Error types for maresdive.

use std::io;
use thiserror::Error;

/// Result type for maresdive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for maresdive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Buffer allocation failure.
    #[error("Out of memory")]
    OutOfMemory,

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Protocol framing error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation aborted on request of the embedding application.
    #[error("Operation cancelled")]
    Cancelled,

    /// Device data does not match the expected format.
    #[error("Data format error: {0}")]
    DataFormat(String),
}
