//! Stream accessor trait for transport layer

use async_trait::async_trait;
use bytes::Bytes;
use dlt645_core::{MeterError, MeterResult};

/// Stream accessor interface to access a physical line shared by meters
///
/// Reads never block: callers ask how many bytes are waiting and collect
/// whatever has arrived. Waiting for a reply is the session layer's job.
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Identifier of the underlying port, used in diagnostics
    fn port_name(&self) -> &str;

    /// Number of received bytes waiting to be read
    fn bytes_available(&self) -> MeterResult<usize>;

    /// Read the bytes that have already arrived
    ///
    /// # Returns
    ///
    /// The received bytes, empty if nothing is waiting
    async fn read_available(&mut self) -> MeterResult<Bytes>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> MeterResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> MeterResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(MeterError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> MeterResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> MeterResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    async fn open(&mut self) -> MeterResult<()>;

    /// Current line rate in bits per second
    fn baud_rate(&self) -> u32;

    /// Reopen the physical layer connection at a new line rate
    async fn set_baud_rate(&mut self, baud_rate: u32) -> MeterResult<()>;
}

pub(crate) fn not_connected(what: &str) -> MeterError {
    MeterError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("{} not connected", what),
    ))
}
