//! DL/T 645 meter polling client
//!
//! This crate ties the lower layers together into a [`MeterSession`]: one
//! shared line, many meters, exclusive exchanges and cached power readings.

pub mod builder;
pub mod config;
pub mod session;

pub use builder::MeterSessionBuilder;
pub use config::MeterConfig;
pub use session::{MeterSession, READ_POWER_ID};
