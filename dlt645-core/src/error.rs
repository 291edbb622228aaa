use std::time::Duration;
use thiserror::Error;

/// Main error type for DL/T 645 operations
///
/// Wire-level invalidity (bad checksum, no reply) is not represented here:
/// the session layer reports it as a value. These variants cover transport
/// failures and caller contract violations.
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Invalid serial number {serial:?}: {reason}")]
    InvalidSerial { serial: String, reason: String },

    #[error("Payload too long: {0} bytes, a frame carries at most 255")]
    PayloadTooLong(usize),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Channel busy: no exclusive access within {0:?}")]
    ChannelBusy(Duration),
}

/// Result type alias for DL/T 645 operations
pub type MeterResult<T> = Result<T, MeterError>;
