//! Core types and utilities for the DL/T 645 meter protocol
//!
//! This crate provides fundamental types, error handling, and value decoding
//! used throughout the DL/T 645 implementation.

pub mod address;
pub mod control;
pub mod error;
pub mod power;

pub use address::{MeterAddress, ADDRESS_LENGTH};
pub use control::ControlCode;
pub use error::{MeterError, MeterResult};
pub use power::decode_power;
