//! Meter session
//!
//! A [`MeterSession`] owns one physical line shared by many meters and many
//! callers. Every exchange runs with exclusive access to the line; power
//! readings are cached per meter so repeated queries do not congest it.

use crate::config::MeterConfig;
use dlt645_core::{decode_power, ControlCode, MeterAddress, MeterError, MeterResult};
use dlt645_session::{ExchangeEngine, ExchangeOutcome, ExchangeStatistics, Frame};
use dlt645_transport::TransportLayer;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Data identifier of the total active power register
pub const READ_POWER_ID: [u8; 4] = [0x00, 0x00, 0x03, 0x02];

/// Line and engine, only reachable through the channel lock
struct Channel<T> {
    transport: T,
    engine: ExchangeEngine,
}

impl<T: TransportLayer> Channel<T> {
    async fn exchange(&mut self, request: &Frame, max_retries: u32) -> MeterResult<ExchangeOutcome> {
        self.engine
            .exchange(&mut self.transport, request, max_retries)
            .await
    }
}

/// Last good power reading of one meter
#[derive(Debug, Clone, Copy, Default)]
struct CacheEntry {
    value: u32,
    fetched_at: Option<Instant>,
}

impl CacheEntry {
    fn fresh_value(&self, ttl: std::time::Duration, now: Instant) -> Option<u32> {
        let fetched_at = self.fetched_at?;
        (now.saturating_duration_since(fetched_at) <= ttl).then_some(self.value)
    }
}

/// Session over one meter line
pub struct MeterSession<T: TransportLayer> {
    config: MeterConfig,
    port_name: String,
    channel: Mutex<Channel<T>>,
    cache: RwLock<HashMap<MeterAddress, CacheEntry>>,
}

impl<T: TransportLayer> MeterSession<T> {
    /// Create a session over a transport
    ///
    /// The transport is not opened; call [`open`](Self::open) first.
    pub fn new(transport: T, config: MeterConfig) -> Self {
        let engine = ExchangeEngine::new(config.exchange_settings());
        Self {
            port_name: transport.port_name().to_string(),
            config,
            channel: Mutex::new(Channel { transport, engine }),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get the session configuration
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Get the name of the underlying port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Derive a meter address from its serial number
    pub fn derive_address(serial: &str) -> MeterResult<MeterAddress> {
        serial.parse()
    }

    /// Open the line
    pub async fn open(&self) -> MeterResult<()> {
        let mut channel = self.lock_channel().await?;
        if let Err(e) = channel.transport.open().await {
            log::error!("Serial port {} open failed: {}", self.port_name, e);
            return Err(e);
        }
        if channel.transport.is_closed() {
            log::error!("Serial port {} did not open", self.port_name);
            return Err(not_open(&self.port_name));
        }
        log::info!(
            "Meter line {} open at {} baud",
            self.port_name,
            channel.transport.baud_rate()
        );
        Ok(())
    }

    /// Close the line
    pub async fn close(&self) -> MeterResult<()> {
        let mut channel = self.lock_channel().await?;
        channel.transport.close().await?;
        log::info!("Meter line {} closed", self.port_name);
        Ok(())
    }

    /// Check if the line is open
    pub async fn is_open(&self) -> bool {
        !self.channel.lock().await.transport.is_closed()
    }

    /// Read the total active power of one meter
    ///
    /// # Arguments
    ///
    /// * `serial` - 12 hex character serial number of the meter
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - Power in thousandths of the meter's unit
    /// * `Ok(None)` - The meter did not give a usable reply; its cached
    ///   value, if any, is kept for later calls
    /// * `Err(_)` - Malformed serial number or transport failure
    pub async fn read_power(&self, serial: &str) -> MeterResult<Option<u32>> {
        let address = Self::derive_address(serial)?;

        if let Some(value) = self.cached_power(&address).await {
            log::trace!("Meter {}: cached power {}", address, value);
            return Ok(Some(value));
        }

        let mut channel = self.lock_channel().await?;
        // Another caller may have read this meter while we waited
        if let Some(value) = self.cached_power(&address).await {
            return Ok(Some(value));
        }

        let request = Frame::new(address, ControlCode::READ_DATA, READ_POWER_ID.to_vec())?;
        let outcome = match channel.exchange(&request, self.config.max_retries).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Port {}, meter {}: power read failed: {}", self.port_name, address, e);
                return Err(e);
            }
        };

        let Some(reply) = self.accepted_reply(address, outcome) else {
            log::error!("Port {}, meter {}: no power reading", self.port_name, address);
            return Ok(None);
        };

        let value = match decode_power(reply.payload()) {
            Ok(value) => value,
            Err(e) => {
                log::error!(
                    "Port {}, meter {}: unreadable power reply: {}",
                    self.port_name,
                    address,
                    e
                );
                return Ok(None);
            }
        };

        // Written before the line is released so waiting callers see it
        self.cache.write().await.insert(
            address,
            CacheEntry {
                value,
                fetched_at: Some(Instant::now()),
            },
        );
        drop(channel);
        Ok(Some(value))
    }

    /// Tell one meter to switch its communication rate
    ///
    /// # Arguments
    ///
    /// * `serial` - Serial number of the meter
    /// * `target_bit_code` - Rate code, see [`MeterConfig::target_baud_code`]
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the meter acknowledged the command.
    pub async fn switch_baud_rate(&self, serial: &str, target_bit_code: u8) -> MeterResult<bool> {
        let address = Self::derive_address(serial)?;
        let request = Frame::new(address, ControlCode::CHANGE_BAUD_RATE, vec![target_bit_code])?;

        let outcome = {
            let mut channel = self.lock_channel().await?;
            match channel.exchange(&request, self.config.max_retries).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!(
                        "Port {}, meter {}: baud switch failed: {}",
                        self.port_name,
                        address,
                        e
                    );
                    return Err(e);
                }
            }
        };

        let acknowledged = self.accepted_reply(address, outcome).is_some();
        if acknowledged {
            log::info!(
                "Meter {} on {} accepted baud code 0x{:02X}",
                address,
                self.port_name,
                target_bit_code
            );
        } else {
            log::error!(
                "Meter {} on {} did not accept baud code 0x{:02X}",
                address,
                self.port_name,
                target_bit_code
            );
        }
        Ok(acknowledged)
    }

    /// Reopen the local line at the configured target rate
    pub async fn change_line_baud_rate(&self) -> MeterResult<()> {
        let mut channel = self.lock_channel().await?;
        let baud_rate = self.config.target_baud_rate;

        if let Err(e) = channel.transport.set_baud_rate(baud_rate).await {
            log::error!("Serial port {} reopen failed: {}", self.port_name, e);
            return Err(e);
        }
        if channel.transport.is_closed() {
            log::error!("Serial port {} did not reopen", self.port_name);
            return Err(not_open(&self.port_name));
        }
        log::info!("Meter line {} now at {} baud", self.port_name, baud_rate);
        Ok(())
    }

    /// Snapshot of the exchange statistics
    pub async fn statistics(&self) -> ExchangeStatistics {
        self.channel.lock().await.engine.statistics().clone()
    }

    async fn cached_power(&self, address: &MeterAddress) -> Option<u32> {
        let cache = self.cache.read().await;
        cache
            .get(address)
            .and_then(|entry| entry.fresh_value(self.config.cache_ttl(), Instant::now()))
    }

    async fn lock_channel(&self) -> MeterResult<MutexGuard<'_, Channel<T>>> {
        match self.config.channel_wait() {
            Some(wait) => tokio::time::timeout(wait, self.channel.lock())
                .await
                .map_err(|_| MeterError::ChannelBusy(wait)),
            None => Ok(self.channel.lock().await),
        }
    }

    /// Keep only replies that answer `address` without refusing
    fn accepted_reply(&self, address: MeterAddress, outcome: ExchangeOutcome) -> Option<Frame> {
        let reply = outcome.into_response()?;

        if reply.address() != address {
            log::warn!(
                "Port {}: reply from meter {} to a request for {}",
                self.port_name,
                reply.address(),
                address
            );
        }
        if reply.control().is_abnormal() {
            log::warn!(
                "Port {}, meter {} refused the request (control {})",
                self.port_name,
                address,
                reply.control()
            );
            return None;
        }
        Some(reply)
    }
}

fn not_open(port_name: &str) -> MeterError {
    MeterError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("Serial port {} is not open", port_name),
    ))
}
