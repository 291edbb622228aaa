//! Session builder
//!
//! ```rust,no_run
//! use dlt645_client::MeterSessionBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> dlt645_core::MeterResult<()> {
//! let session = MeterSessionBuilder::new()
//!     .serial("/dev/ttyUSB0")
//!     .max_retries(2)
//!     .cache_ttl(Duration::from_secs(2))
//!     .build()?;
//! session.open().await?;
//! let power = session.read_power("000012345678").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::MeterConfig;
use crate::session::MeterSession;
use dlt645_core::{MeterError, MeterResult};
use dlt645_transport::{SerialTransport, TransportLayer};
use std::time::Duration;

/// Builder for [`MeterSession`]
///
/// Starts from [`MeterConfig::default`]; individual setters override single
/// fields, [`config`](Self::config) replaces the whole configuration.
#[derive(Debug, Clone, Default)]
pub struct MeterSessionBuilder {
    port_name: Option<String>,
    config: MeterConfig,
}

impl MeterSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a serial port, e.g. `/dev/ttyUSB0` or `COM1`
    pub fn serial(mut self, port_name: &str) -> Self {
        self.port_name = Some(port_name.to_string());
        self
    }

    pub fn config(mut self, config: MeterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.initial_baud_rate = baud_rate;
        self
    }

    /// Set the local rate and meter bit code used after a baud switch
    pub fn target_baud_rate(mut self, baud_rate: u32, bit_code: u8) -> Self {
        self.config.target_baud_rate = baud_rate;
        self.config.target_baud_code = bit_code;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Bound the wait for the shared line
    pub fn channel_wait(mut self, wait: Duration) -> Self {
        self.config.channel_wait_ms = Some(wait.as_millis() as u64);
        self
    }

    /// Build a session over the configured serial port
    ///
    /// # Errors
    ///
    /// Returns `MeterError::Configuration` if no port was set.
    pub fn build(self) -> MeterResult<MeterSession<SerialTransport>> {
        let port_name = self
            .port_name
            .ok_or_else(|| MeterError::Configuration("Serial port not configured".to_string()))?;
        let transport = SerialTransport::new_simple(port_name, self.config.initial_baud_rate);
        Ok(MeterSession::new(transport, self.config))
    }

    /// Build a session over a caller-supplied transport
    ///
    /// The configured port name is ignored.
    pub fn build_with<T: TransportLayer>(self, transport: T) -> MeterSession<T> {
        MeterSession::new(transport, self.config)
    }
}
