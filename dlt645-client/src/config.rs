//! Meter session configuration

use dlt645_session::ExchangeSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a meter session
///
/// Every field has a default, so a partial configuration file only needs to
/// name what differs. Durations are given in milliseconds.
///
/// ```json
/// { "target_baud_rate": 4800, "target_baud_code": 16, "cache_ttl_ms": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Line rate used when the port is first opened
    pub initial_baud_rate: u32,
    /// Line rate after `change_line_baud_rate`
    pub target_baud_rate: u32,
    /// Bit code telling a meter to switch to `target_baud_rate`
    ///
    /// 0x04 = 1200, 0x08 = 2400, 0x10 = 4800, 0x20 = 9600
    pub target_baud_code: u8,
    /// Additional attempts after the first for every exchange
    pub max_retries: u32,
    /// Sleep between polls that find no data
    pub idle_interval_ms: u64,
    /// Consecutive empty polls before an attempt times out
    pub max_idle_polls: u32,
    /// Wait between writing a request and reading the reply
    pub settle_time_ms: u64,
    /// How long a power reading is served from cache
    pub cache_ttl_ms: u64,
    /// Bound on waiting for the shared line; `None` waits indefinitely
    pub channel_wait_ms: Option<u64>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            initial_baud_rate: 2400,
            target_baud_rate: 9600,
            target_baud_code: 0x20,
            max_retries: 4,
            idle_interval_ms: 50,
            max_idle_polls: 10,
            settle_time_ms: 500,
            cache_ttl_ms: 3000,
            channel_wait_ms: None,
        }
    }
}

impl MeterConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn channel_wait(&self) -> Option<Duration> {
        self.channel_wait_ms.map(Duration::from_millis)
    }

    /// Timing handed to the exchange engine
    pub fn exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            settle_time: self.settle_time(),
            idle_interval: self.idle_interval(),
            max_idle_polls: self.max_idle_polls,
        }
    }
}
