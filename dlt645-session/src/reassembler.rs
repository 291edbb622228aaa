//! DL/T 645 frame reassembler
//!
//! Frames arrive in arbitrary chunks. The reassembler walks the header one
//! byte at a time and uses the length byte to know where the frame ends, so
//! chunk boundaries never matter.

use crate::frame::SYNC;
use bytes::{Bytes, BytesMut};
use dlt645_core::{MeterResult, ADDRESS_LENGTH};
use dlt645_transport::StreamAccessor;
use std::time::Duration;

/// Reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblerState {
    /// Discarding bytes until the first sync byte
    AwaitStart,
    /// Collecting address bytes
    InAddress { remaining: u8 },
    /// Expecting the second sync byte (taken as-is)
    AwaitSecondSync,
    InControl,
    InLength,
    /// Collecting payload bytes
    InPayload { remaining: u8 },
    InChecksum,
    /// Expecting the terminator
    InEof,
}

/// Byte-driven frame reassembler
#[derive(Debug)]
pub struct FrameReassembler {
    state: ReassemblerState,
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self {
            state: ReassemblerState::AwaitStart,
            buffer: BytesMut::new(),
        }
    }

    /// Get the current state
    pub fn state(&self) -> ReassemblerState {
        self.state
    }

    /// Number of bytes accumulated for the frame in progress
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame and wait for a new start
    pub fn reset(&mut self) {
        self.state = ReassemblerState::AwaitStart;
        self.buffer.clear();
    }

    /// Process one byte
    ///
    /// Returns the complete frame, from the first sync byte through the
    /// terminator, once its last byte has been pushed.
    pub fn push(&mut self, byte: u8) -> Option<Bytes> {
        use ReassemblerState::*;

        if self.state == AwaitStart {
            if byte == SYNC {
                self.buffer.extend_from_slice(&[byte]);
                self.state = InAddress {
                    remaining: ADDRESS_LENGTH as u8,
                };
            }
            return None;
        }

        self.buffer.extend_from_slice(&[byte]);
        let next = match self.state {
            // AwaitStart never gets here
            AwaitStart | InEof => AwaitStart,
            InAddress { remaining: 1 } => AwaitSecondSync,
            InAddress { remaining } => InAddress {
                remaining: remaining - 1,
            },
            AwaitSecondSync => InControl,
            InControl => InLength,
            InLength if byte == 0 => InChecksum,
            InLength => InPayload { remaining: byte },
            InPayload { remaining: 1 } => InChecksum,
            InPayload { remaining } => InPayload {
                remaining: remaining - 1,
            },
            InChecksum => InEof,
        };
        self.state = next;

        if next == AwaitStart {
            return Some(self.buffer.split().freeze());
        }
        None
    }

    /// Process a chunk
    ///
    /// Stops at the first complete frame and returns it together with the
    /// number of chunk bytes left unconsumed after its terminator.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<(Bytes, usize)> {
        for (i, &byte) in chunk.iter().enumerate() {
            if let Some(frame) = self.push(byte) {
                return Some((frame, chunk.len() - i - 1));
            }
        }
        None
    }

    /// Read one frame from a stream
    ///
    /// Polls the stream for available bytes. Every poll that finds nothing
    /// counts as idle; after `max_idle_polls` consecutive idle polls the
    /// partial frame is discarded and `Ok(None)` is returned. Bytes that
    /// follow the terminator in the same chunk are dropped.
    ///
    /// # Arguments
    ///
    /// * `stream` - Line to read from
    /// * `idle_interval` - Sleep between idle polls
    /// * `max_idle_polls` - Idle polls before giving up (at least one)
    pub async fn read_frame<S: StreamAccessor + ?Sized>(
        &mut self,
        stream: &mut S,
        idle_interval: Duration,
        max_idle_polls: u32,
    ) -> MeterResult<Option<Bytes>> {
        self.reset();
        let max_idle_polls = max_idle_polls.max(1);
        let mut idle_polls = 0u32;

        loop {
            let chunk = if stream.bytes_available()? > 0 {
                stream.read_available().await?
            } else {
                Bytes::new()
            };

            if chunk.is_empty() {
                idle_polls += 1;
                if idle_polls >= max_idle_polls {
                    if self.buffered() > 0 {
                        log::debug!(
                            "Discarding {} bytes of incomplete frame on {} ({:?})",
                            self.buffered(),
                            stream.port_name(),
                            self.state
                        );
                    }
                    self.reset();
                    return Ok(None);
                }
                tokio::time::sleep(idle_interval).await;
                continue;
            }

            idle_polls = 0;
            if let Some((frame, trailing)) = self.feed(&chunk) {
                if trailing > 0 {
                    log::trace!(
                        "Dropped {} bytes after frame terminator on {}",
                        trailing,
                        stream.port_name()
                    );
                }
                return Ok(Some(frame));
            }
        }
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}
