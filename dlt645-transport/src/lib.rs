//! Transport layer module for the DL/T 645 protocol
//!
//! This crate provides the byte-level link to the meters: a serial port
//! implementation and an in-memory line that simulates meters for testing.

pub mod memory;
pub mod serial;
pub mod stream;

pub use dlt645_core::{MeterError, MeterResult};
pub use memory::{LineLog, MemoryTransport, Responder, WriteRecord};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{StreamAccessor, TransportLayer};
