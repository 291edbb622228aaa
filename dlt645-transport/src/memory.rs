//! In-memory transport that simulates meters on a shared line
//!
//! Every write is handed to a [`Responder`], whose output becomes readable
//! immediately. The transport records when each write started and finished so
//! callers can check how traffic was serialized.

use crate::stream::{not_connected, StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dlt645_core::{MeterError, MeterResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Produces the bytes the line returns for one written request
///
/// Return an empty vector to simulate a meter that does not answer.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send + Sync>;

/// One write as seen by the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub bytes: Vec<u8>,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared handle on the writes a [`MemoryTransport`] received
///
/// Stays readable after the transport has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct LineLog {
    writes: Arc<Mutex<Vec<WriteRecord>>>,
}

impl LineLog {
    /// Snapshot of all writes, in the order they happened
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of writes so far
    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn push(&self, record: WriteRecord) {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }
}

/// In-memory transport layer implementation
pub struct MemoryTransport {
    port_name: String,
    baud_rate: u32,
    closed: bool,
    refuse_open: bool,
    pending: BytesMut,
    responder: Responder,
    chunk_size: usize,
    write_delay: Duration,
    log: LineLog,
}

impl MemoryTransport {
    /// Create a new in-memory line
    ///
    /// # Arguments
    ///
    /// * `port_name` - Name reported in diagnostics
    /// * `responder` - Simulated meters answering each request
    pub fn new(port_name: impl Into<String>, responder: Responder) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 2400,
            closed: true,
            refuse_open: false,
            pending: BytesMut::new(),
            responder,
            chunk_size: usize::MAX,
            write_delay: Duration::ZERO,
            log: LineLog::default(),
        }
    }

    /// Create a line on which no meter ever answers
    pub fn silent(port_name: impl Into<String>) -> Self {
        Self::new(port_name, Box::new(|_: &[u8]| Vec::new()))
    }

    /// Deliver received bytes in chunks of at most `chunk_size`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Make every write take `delay` to complete
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Make `open()` fail, as a missing device would
    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Get a handle on the write log
    pub fn log(&self) -> LineLog {
        self.log.clone()
    }

    /// Queue bytes as if they had arrived on the line
    pub fn inject(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("closed", &self.closed)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> MeterResult<()> {
        if self.refuse_open {
            return Err(MeterError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Failed to open {}", self.port_name),
            )));
        }
        if !self.closed {
            return Err(MeterError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }
        self.closed = false;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> MeterResult<()> {
        self.baud_rate = baud_rate;
        self.close().await?;
        self.open().await
    }
}

#[async_trait]
impl StreamAccessor for MemoryTransport {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn bytes_available(&self) -> MeterResult<usize> {
        if self.closed {
            return Err(not_connected("Memory line"));
        }
        Ok(self.pending.len())
    }

    async fn read_available(&mut self) -> MeterResult<Bytes> {
        if self.closed {
            return Err(not_connected("Memory line"));
        }
        let n = self.pending.len().min(self.chunk_size);
        Ok(self.pending.split_to(n).freeze())
    }

    async fn write(&mut self, buf: &[u8]) -> MeterResult<usize> {
        if self.closed {
            return Err(not_connected("Memory line"));
        }

        let started = Instant::now();
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        let reply = (self.responder)(buf);
        self.pending.extend_from_slice(&reply);
        self.log.push(WriteRecord {
            bytes: buf.to_vec(),
            started,
            finished: Instant::now(),
        });
        Ok(buf.len())
    }

    async fn flush(&mut self) -> MeterResult<()> {
        if self.closed {
            return Err(not_connected("Memory line"));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> MeterResult<()> {
        self.pending.clear();
        self.closed = true;
        Ok(())
    }
}
