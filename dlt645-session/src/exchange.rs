//! Request/response exchange with bounded retries
//!
//! One exchange writes a request, waits for the meter to settle, then
//! reassembles and verifies the reply. A missing or corrupted reply causes the
//! identical request to be sent again, up to `max_retries` more times.

use crate::frame::Frame;
use crate::reassembler::FrameReassembler;
use crate::statistics::ExchangeStatistics;
use dlt645_core::MeterResult;
use dlt645_transport::StreamAccessor;
use std::time::Duration;

/// Timing used by the exchange engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Wait after each write before the reply is read
    pub settle_time: Duration,
    /// Sleep between polls that find no data
    pub idle_interval: Duration,
    /// Consecutive empty polls before an attempt counts as a timeout
    pub max_idle_polls: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            settle_time: Duration::from_millis(500),
            idle_interval: Duration::from_millis(50),
            max_idle_polls: 10,
        }
    }
}

/// Result of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A reply passed checksum verification
    Response(Frame),
    /// The last attempt saw no complete frame
    NoResponse,
    /// The last attempt saw a frame whose checksum did not match
    ChecksumFailed,
}

impl ExchangeOutcome {
    pub fn is_response(&self) -> bool {
        matches!(self, ExchangeOutcome::Response(_))
    }

    /// Get the reply frame, if any
    pub fn into_response(self) -> Option<Frame> {
        match self {
            ExchangeOutcome::Response(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Exchange engine
///
/// Holds no line of its own; the caller lends it one per exchange. Callers
/// must ensure only one exchange runs on a line at a time.
#[derive(Debug)]
pub struct ExchangeEngine {
    settings: ExchangeSettings,
    reassembler: FrameReassembler,
    statistics: ExchangeStatistics,
}

impl ExchangeEngine {
    pub fn new(settings: ExchangeSettings) -> Self {
        Self {
            settings,
            reassembler: FrameReassembler::new(),
            statistics: ExchangeStatistics::new(),
        }
    }

    /// Get the timing settings
    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    /// Get the statistics collected so far
    pub fn statistics(&self) -> &ExchangeStatistics {
        &self.statistics
    }

    pub fn clear_statistics(&mut self) {
        self.statistics.clear();
    }

    /// Send a request and wait for its reply
    ///
    /// # Arguments
    ///
    /// * `stream` - Open line, held exclusively for the whole call
    /// * `request` - Frame to send; the same bytes go out on every attempt
    /// * `max_retries` - Additional attempts after the first
    ///
    /// # Returns
    ///
    /// The outcome of the exchange. Only transport failures are returned as
    /// errors; they abort the exchange without further attempts.
    pub async fn exchange<S: StreamAccessor + ?Sized>(
        &mut self,
        stream: &mut S,
        request: &Frame,
        max_retries: u32,
    ) -> MeterResult<ExchangeOutcome> {
        let encoded = request.encode();
        let attempts = max_retries.saturating_add(1);
        // Single-shot requests get twice the settle time
        let settle_time = if max_retries == 0 {
            self.settings.settle_time * 2
        } else {
            self.settings.settle_time
        };

        log::debug!("TX {} on {}: {:02X?}", request, stream.port_name(), encoded);

        let mut outcome = ExchangeOutcome::NoResponse;
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.statistics.increment_retransmissions();
            }

            self.drain_input(stream).await?;
            stream.write_all(&encoded).await?;
            stream.flush().await?;
            self.statistics.increment_frames_sent();

            tokio::time::sleep(settle_time).await;

            let raw = self
                .reassembler
                .read_frame(stream, self.settings.idle_interval, self.settings.max_idle_polls)
                .await?;

            let Some(raw) = raw else {
                self.statistics.increment_timeouts();
                log::error!(
                    "No response from meter {} on {} (attempt {}/{})",
                    request.address(),
                    stream.port_name(),
                    attempt,
                    attempts
                );
                outcome = ExchangeOutcome::NoResponse;
                continue;
            };

            self.statistics.increment_frames_received();
            match Frame::decode(&raw) {
                Ok(reply) => {
                    log::debug!("RX {} on {}: {:02X?}", reply, stream.port_name(), &raw[..]);
                    return Ok(ExchangeOutcome::Response(reply));
                }
                Err(e) => {
                    self.statistics.increment_checksum_errors();
                    log::warn!(
                        "Invalid reply from meter {} on {}: {} (attempt {}/{})",
                        request.address(),
                        stream.port_name(),
                        e,
                        attempt,
                        attempts
                    );
                    outcome = ExchangeOutcome::ChecksumFailed;
                }
            }
        }

        self.statistics.increment_failed_exchanges();
        log::error!(
            "Meter {} on {} gave no valid reply after {} attempts",
            request.address(),
            stream.port_name(),
            attempts
        );
        Ok(outcome)
    }

    /// Discard bytes left over from earlier traffic
    async fn drain_input<S: StreamAccessor + ?Sized>(&mut self, stream: &mut S) -> MeterResult<()> {
        let mut drained = 0;
        while stream.bytes_available()? > 0 {
            let stale = stream.read_available().await?;
            if stale.is_empty() {
                break;
            }
            drained += stale.len();
        }

        if drained > 0 {
            self.statistics.add_discarded_bytes(drained);
            log::trace!("Discarded {} stale bytes on {}", drained, stream.port_name());
        }
        Ok(())
    }
}

impl Default for ExchangeEngine {
    fn default() -> Self {
        Self::new(ExchangeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLine;
    use dlt645_core::{ControlCode, MeterAddress};
    use dlt645_transport::{MemoryTransport, Responder, TransportLayer};

    fn fast_settings() -> ExchangeSettings {
        ExchangeSettings {
            settle_time: Duration::from_millis(1),
            idle_interval: Duration::from_millis(1),
            max_idle_polls: 2,
        }
    }

    fn request() -> Frame {
        let address = MeterAddress::from_serial("000012345678").unwrap();
        Frame::new(address, ControlCode::READ_DATA, vec![0x00, 0x00, 0x03, 0x02]).unwrap()
    }

    /// Answers every read request with a fixed power payload
    fn meter() -> Responder {
        Box::new(|raw: &[u8]| {
            let Ok(req) = Frame::decode(raw) else {
                return Vec::new();
            };
            let mut payload = req.payload().to_vec();
            payload.extend_from_slice(&[0x45, 0x23, 0x01]);
            Frame::new(req.address(), ControlCode::new(0x91), payload)
                .unwrap()
                .encode()
        })
    }

    #[tokio::test]
    async fn test_silent_meter_gets_max_retries_plus_one_writes() {
        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock0".to_string());
        line.expect_bytes_available().returning(|| Ok(0));
        line.expect_write()
            .times(5)
            .returning(|buf: &[u8]| Ok(buf.len()));
        line.expect_flush().times(5).returning(|| Ok(()));

        let mut engine = ExchangeEngine::new(fast_settings());
        let outcome = engine.exchange(&mut line, &request(), 4).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::NoResponse);
        let stats = engine.statistics();
        assert_eq!(stats.frames_sent, 5);
        assert_eq!(stats.timeouts, 5);
        assert_eq!(stats.retransmissions, 4);
        assert_eq!(stats.failed_exchanges, 1);
    }

    #[tokio::test]
    async fn test_write_error_aborts_exchange() {
        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock0".to_string());
        line.expect_bytes_available().returning(|| Ok(0));
        line.expect_write().times(1).returning(|_: &[u8]| {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into())
        });

        let mut engine = ExchangeEngine::new(fast_settings());
        let result = engine.exchange(&mut line, &request(), 4).await;
        assert!(matches!(result, Err(dlt645_core::MeterError::Connection(_))));
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let mut line = MemoryTransport::new("mem0", meter()).with_chunk_size(3);
        let log = line.log();
        line.open().await.unwrap();

        let mut engine = ExchangeEngine::new(fast_settings());
        let reply = engine
            .exchange(&mut line, &request(), 4)
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(reply.control().value(), 0x91);
        assert_eq!(reply.payload(), &[0x00, 0x00, 0x03, 0x02, 0x45, 0x23, 0x01]);
        assert_eq!(log.write_count(), 1);
        assert_eq!(log.writes()[0].bytes, request().encode());
    }

    #[tokio::test]
    async fn test_corrupted_replies_are_retried() {
        let responder: Responder = Box::new(|raw: &[u8]| {
            let mut reply = raw.to_vec();
            let cs_pos = reply.len() - 2;
            reply[cs_pos] ^= 0xFF;
            reply
        });
        let mut line = MemoryTransport::new("mem0", responder);
        let log = line.log();
        line.open().await.unwrap();

        let mut engine = ExchangeEngine::new(fast_settings());
        let outcome = engine.exchange(&mut line, &request(), 2).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::ChecksumFailed);
        assert_eq!(log.write_count(), 3);
        assert_eq!(engine.statistics().checksum_errors, 3);
    }

    #[tokio::test]
    async fn test_recovers_after_one_missed_reply() {
        let mut answered = false;
        let mut inner = meter();
        let responder: Responder = Box::new(move |raw: &[u8]| {
            if !answered {
                answered = true;
                return Vec::new();
            }
            inner(raw)
        });
        let mut line = MemoryTransport::new("mem0", responder);
        let log = line.log();
        line.open().await.unwrap();

        let mut engine = ExchangeEngine::new(fast_settings());
        let outcome = engine.exchange(&mut line, &request(), 4).await.unwrap();

        assert!(outcome.is_response());
        assert_eq!(log.write_count(), 2);
        assert_eq!(engine.statistics().timeouts, 1);
    }

    #[tokio::test]
    async fn test_stale_input_is_drained_before_write() {
        let mut line = MemoryTransport::new("mem0", meter());
        line.open().await.unwrap();
        // A late reply from an earlier request
        line.inject(&request().encode());

        let mut engine = ExchangeEngine::new(fast_settings());
        let reply = engine
            .exchange(&mut line, &request(), 0)
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(reply.control().value(), 0x91);
        assert_eq!(engine.statistics().discarded_bytes, 18);
    }

    #[tokio::test]
    async fn test_single_shot_doubles_settle_time() {
        let mut line = MemoryTransport::silent("mem0");
        line.open().await.unwrap();

        let settings = ExchangeSettings {
            settle_time: Duration::from_millis(40),
            idle_interval: Duration::from_millis(1),
            max_idle_polls: 1,
        };
        let mut engine = ExchangeEngine::new(settings);

        let started = std::time::Instant::now();
        let outcome = engine.exchange(&mut line, &request(), 0).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::NoResponse);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
