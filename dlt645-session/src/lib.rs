//! Session layer module for the DL/T 645 protocol
//!
//! This crate turns requests into wire frames and wire bytes back into
//! validated frames:
//!
//! - [`frame`]: frame encoding/decoding, checksum and payload obfuscation
//! - [`reassembler`]: byte-by-byte frame reassembly with idle timeout
//! - [`exchange`]: request/response cycle with bounded retries
//! - [`statistics`]: counters collected by the exchange engine

pub mod exchange;
pub mod frame;
pub mod reassembler;
pub mod statistics;

#[cfg(test)]
mod testing;

pub use dlt645_core::{MeterError, MeterResult};
pub use exchange::{ExchangeEngine, ExchangeOutcome, ExchangeSettings};
pub use frame::{checksum, Frame, FrameError, PREAMBLE, SYNC, TERMINATOR};
pub use reassembler::{FrameReassembler, ReassemblerState};
pub use statistics::ExchangeStatistics;
