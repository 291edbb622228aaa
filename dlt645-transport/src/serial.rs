//! Serial port transport implementation

use crate::stream::{not_connected, StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dlt645_core::{MeterError, MeterResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialStream};

/// Wrapper for SerialStream that implements Debug
struct DebugSerialStream(SerialStream);

impl fmt::Debug for DebugSerialStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialStream").finish()
    }
}

impl Deref for DebugSerialStream {
    type Target = SerialStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugSerialStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Serial port transport layer settings
///
/// DL/T 645 lines run 8 data bits, even parity, one stop bit.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
}

impl SerialSettings {
    /// Create new serial settings with the protocol's line parameters
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::Even,
            flow_control: tokio_serial::FlowControl::None,
        }
    }
}

/// Serial port transport layer implementation
#[derive(Debug)]
pub struct SerialTransport {
    stream: Option<DebugSerialStream>,
    settings: SerialSettings,
    closed: bool,
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create serial transport with port name and baud rate
    pub fn new_simple(port_name: String, baud_rate: u32) -> Self {
        Self::new(SerialSettings::new(port_name, baud_rate))
    }

    /// Get the current settings
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> MeterResult<()> {
        if !self.closed {
            return Err(MeterError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            MeterError::Connection(std::io::Error::other(format!(
                "Failed to open serial port {}: {}",
                self.settings.port_name, e
            )))
        })?;

        log::info!(
            "Serial port {} opened at {} baud",
            self.settings.port_name,
            self.settings.baud_rate
        );
        self.stream = Some(DebugSerialStream(stream));
        self.closed = false;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.settings.baud_rate
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> MeterResult<()> {
        self.settings.baud_rate = baud_rate;
        self.close().await?;
        self.open().await
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
    fn port_name(&self) -> &str {
        &self.settings.port_name
    }

    fn bytes_available(&self) -> MeterResult<usize> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| not_connected("Serial stream"))?;

        let pending = stream
            .bytes_to_read()
            .map_err(|e| MeterError::Connection(e.into()))?;
        Ok(pending as usize)
    }

    async fn read_available(&mut self) -> MeterResult<Bytes> {
        let pending = self.bytes_available()?;
        if pending == 0 {
            return Ok(Bytes::new());
        }

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| not_connected("Serial stream"))?;

        let mut buf = BytesMut::zeroed(pending);
        let result = stream.read(&mut buf).await;
        match result {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf.freeze())
            }
            Err(e) => {
                self.closed = true;
                Err(MeterError::Connection(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> MeterResult<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| not_connected("Serial stream"))?;

        stream.write(buf).await.map_err(MeterError::Connection)
    }

    async fn flush(&mut self) -> MeterResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| not_connected("Serial stream"))?;

        stream.flush().await.map_err(MeterError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> MeterResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush().await;
        }
        self.closed = true;
        Ok(())
    }
}
