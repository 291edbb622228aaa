//! Exchange statistics collection

/// Request/response statistics for one meter line
///
/// Updated by [`ExchangeEngine`](crate::ExchangeEngine) on every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeStatistics {
    /// Total number of request frames written
    pub frames_sent: u64,
    /// Total number of complete frames reassembled
    pub frames_received: u64,
    /// Number of attempts that ended without a complete frame
    pub timeouts: u64,
    /// Number of reassembled frames that failed checksum verification
    pub checksum_errors: u64,
    /// Number of attempts beyond the first
    pub retransmissions: u64,
    /// Number of exchanges that used up every attempt
    pub failed_exchanges: u64,
    /// Number of stale bytes discarded before a request
    pub discarded_bytes: u64,
}

impl ExchangeStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn increment_timeouts(&mut self) {
        self.timeouts += 1;
    }

    pub fn increment_checksum_errors(&mut self) {
        self.checksum_errors += 1;
    }

    pub fn increment_retransmissions(&mut self) {
        self.retransmissions += 1;
    }

    pub fn increment_failed_exchanges(&mut self) {
        self.failed_exchanges += 1;
    }

    pub fn add_discarded_bytes(&mut self, count: usize) {
        self.discarded_bytes += count as u64;
    }

    /// Get error rate as a percentage of attempts
    ///
    /// Returns 0.0 if nothing has been sent.
    pub fn error_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            ((self.timeouts + self.checksum_errors) as f64 / self.frames_sent as f64) * 100.0
        }
    }
}
