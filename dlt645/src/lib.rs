//! dlt645 - Rust implementation of the DL/T 645 meter polling protocol
//!
//! Polls power readings from many meters sharing one half-duplex serial
//! line. Concurrent callers are serialized onto the line, every exchange is
//! retried a bounded number of times, and readings are cached per meter.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `dlt645-core`: Error type, meter addresses, control codes, power decoding
//! - `dlt645-transport`: Transport layer (Serial, in-memory line)
//! - `dlt645-session`: Frame codec, reassembler, exchange engine
//! - `dlt645-client`: Meter session, configuration and builder
//!
//! # Usage
//!
//! ```no_run
//! use dlt645::client::MeterSessionBuilder;
//!
//! # async fn example() -> dlt645::MeterResult<()> {
//! let session = MeterSessionBuilder::new().serial("/dev/ttyUSB0").build()?;
//! session.open().await?;
//!
//! match session.read_power("000012345678").await? {
//!     Some(milli) => println!("power: {}.{:03}", milli / 1000, milli % 1000),
//!     None => println!("meter unavailable"),
//! }
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use dlt645_core::{ControlCode, MeterAddress, MeterError, MeterResult};

// Re-export client API
pub mod client {
    pub use dlt645_client::*;
}

// Re-export session layer
pub mod session {
    pub use dlt645_session::*;
}

// Re-export transports
pub mod transport {
    pub use dlt645_transport::*;
}
