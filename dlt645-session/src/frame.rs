//! DL/T 645 frame structure and encoding/decoding
//!
//! ```text
//! +-------+------+---------+------+------+-----+----------+----+------+
//! | FE FE | 0x68 | Address | 0x68 | Ctrl | Len | Payload  | CS | 0x16 |
//! |  (2)  | (1)  |   (6)   | (1)  | (1)  | (1) | (Len)    | (1)| (1)  |
//! +-------+------+---------+------+------+-----+----------+----+------+
//! ```
//!
//! - The address travels least significant byte first.
//! - Every payload byte travels as `value + 0x33` (mod 256).
//! - CS is the sum, mod 256, of every byte from the first `0x68` through the
//!   last payload byte.

use dlt645_core::{ControlCode, MeterAddress, MeterError, MeterResult, ADDRESS_LENGTH};
use std::fmt;
use thiserror::Error;

/// Wake-up bytes sent ahead of every request
pub const PREAMBLE: [u8; 2] = [0xFE, 0xFE];

/// Sync byte bracketing the address
pub const SYNC: u8 = 0x68;

/// Last byte of every frame
pub const TERMINATOR: u8 = 0x16;

/// Offset added to every payload byte on the wire
pub const OBFUSCATION_OFFSET: u8 = 0x33;

/// Largest payload a one-byte length field can describe
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// Bytes from the first sync byte through the length byte
pub const HEADER_LENGTH: usize = 1 + ADDRESS_LENGTH + 1 + 1 + 1;

/// Checksum and terminator
pub const TRAILER_LENGTH: usize = 2;

/// Smallest frame, measured from the first sync byte
pub const MIN_FRAME_LENGTH: usize = HEADER_LENGTH + TRAILER_LENGTH;

const ADDRESS_OFFSET: usize = 1;
const CONTROL_OFFSET: usize = 8;

/// Reasons a received byte sequence is not a usable frame
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: {0} bytes")]
    Truncated(usize),

    #[error("Checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// Sum of `bytes` modulo 256
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Apply the payload offset to one byte
pub fn obfuscate(value: u8) -> u8 {
    value.wrapping_add(OBFUSCATION_OFFSET)
}

/// Remove the payload offset from one byte
pub fn reveal(wire: u8) -> u8 {
    wire.wrapping_sub(OBFUSCATION_OFFSET)
}

/// DL/T 645 frame
///
/// A decoded `Frame` always passed checksum verification; there is no way to
/// obtain address, control or payload from a frame that did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    address: MeterAddress,
    control: ControlCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame
    ///
    /// # Arguments
    ///
    /// * `address` - Target meter
    /// * `control` - Command code
    /// * `payload` - Plain payload, obfuscated on encoding
    ///
    /// # Returns
    ///
    /// `Err(MeterError::PayloadTooLong)` if the payload does not fit the
    /// one-byte length field.
    pub fn new(
        address: MeterAddress,
        control: ControlCode,
        payload: Vec<u8>,
    ) -> MeterResult<Self> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(MeterError::PayloadTooLong(payload.len()));
        }
        Ok(Self {
            address,
            control,
            payload,
        })
    }

    /// Encode frame to bytes, preamble included
    pub fn encode(&self) -> Vec<u8> {
        let mut result =
            Vec::with_capacity(PREAMBLE.len() + MIN_FRAME_LENGTH + self.payload.len());

        result.extend_from_slice(&PREAMBLE);
        result.push(SYNC);
        result.extend_from_slice(&self.address.to_wire());
        result.push(SYNC);
        result.push(self.control.value());
        // Length checked in new()
        result.push(self.payload.len() as u8);
        result.extend(self.payload.iter().map(|&b| obfuscate(b)));

        let cs = checksum(&result[PREAMBLE.len()..]);
        result.push(cs);
        result.push(TERMINATOR);
        result
    }

    /// Decode a frame from bytes
    ///
    /// Leading preamble bytes are skipped. The payload is every byte between
    /// the length byte and the checksum byte.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        let start = raw.iter().take_while(|&&b| b == PREAMBLE[0]).count();
        let frame = &raw[start..];

        if frame.len() < MIN_FRAME_LENGTH {
            return Err(FrameError::Truncated(frame.len()));
        }

        let cs_pos = frame.len() - TRAILER_LENGTH;
        let computed = checksum(&frame[..cs_pos]);
        let received = frame[cs_pos];
        if computed != received {
            return Err(FrameError::ChecksumMismatch { computed, received });
        }

        let mut wire_address = [0u8; ADDRESS_LENGTH];
        wire_address.copy_from_slice(&frame[ADDRESS_OFFSET..ADDRESS_OFFSET + ADDRESS_LENGTH]);

        Ok(Self {
            address: MeterAddress::from_wire(wire_address),
            control: ControlCode::new(frame[CONTROL_OFFSET]),
            payload: frame[HEADER_LENGTH..cs_pos].iter().map(|&b| reveal(b)).collect(),
        })
    }

    /// Get the meter address
    pub fn address(&self) -> MeterAddress {
        self.address
    }

    /// Get the control code
    pub fn control(&self) -> ControlCode {
        self.control
    }

    /// Get the plain payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and return its payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DL/T 645 Frame: addr={}, ctrl={}, len={}",
            self.address,
            self.control,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> MeterAddress {
        MeterAddress::from_serial("000012345678").unwrap()
    }

    #[test]
    fn test_encode_read_power_request() {
        let frame = Frame::new(
            sample_address(),
            ControlCode::READ_DATA,
            vec![0x00, 0x00, 0x03, 0x02],
        )
        .unwrap();

        let encoded = frame.encode();
        let expected_body = [
            0x68, 0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x68, 0x11, 0x04, 0x33, 0x33, 0x36, 0x35,
        ];
        assert_eq!(&encoded[..2], &PREAMBLE);
        assert_eq!(&encoded[2..16], &expected_body);
        assert_eq!(encoded[16], checksum(&expected_body));
        assert_eq!(encoded[17], TERMINATOR);
    }

    #[test]
    fn test_round_trip() {
        let payloads: [Vec<u8>; 3] = [vec![], vec![0xCD, 0x00, 0xFF], (0..=254).collect()];
        for payload in payloads {
            let frame = Frame::new(sample_address(), ControlCode::new(0x91), payload).unwrap();
            let decoded = Frame::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_max_payload_round_trip() {
        let payload = vec![0xAA; MAX_PAYLOAD_LENGTH];
        let frame = Frame::new(sample_address(), ControlCode::READ_DATA, payload).unwrap();
        let encoded = frame.encode();
        assert_eq!(encoded[2 + HEADER_LENGTH - 1], 0xFF);
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_payload_too_long() {
        let err = Frame::new(sample_address(), ControlCode::READ_DATA, vec![0; 256]).unwrap_err();
        assert!(matches!(err, MeterError::PayloadTooLong(256)));
    }

    #[test]
    fn test_decode_without_preamble() {
        let frame = Frame::new(sample_address(), ControlCode::new(0x97), vec![0x20]).unwrap();
        let encoded = frame.encode();
        assert_eq!(Frame::decode(&encoded[PREAMBLE.len()..]).unwrap(), frame);
    }

    #[test]
    fn test_single_bit_flip_is_detected() {
        let frame = Frame::new(sample_address(), ControlCode::READ_DATA, vec![1, 2, 3, 4]).unwrap();
        let encoded = frame.encode();
        let cs_pos = encoded.len() - TRAILER_LENGTH;

        for pos in PREAMBLE.len()..cs_pos {
            for bit in 0..8 {
                let mut corrupted = encoded.clone();
                corrupted[pos] ^= 1 << bit;
                assert!(
                    matches!(
                        Frame::decode(&corrupted),
                        Err(FrameError::ChecksumMismatch { .. })
                    ),
                    "flip of bit {} at byte {} went unnoticed",
                    bit,
                    pos
                );
            }
        }
    }

    #[test]
    fn test_corrupted_checksum_byte() {
        let frame = Frame::new(sample_address(), ControlCode::READ_DATA, vec![]).unwrap();
        let mut encoded = frame.encode();
        let cs_pos = encoded.len() - TRAILER_LENGTH;
        encoded[cs_pos] = encoded[cs_pos].wrapping_add(1);
        assert!(Frame::decode(&encoded).is_err());
    }

    #[test]
    fn test_truncated_frame() {
        assert_eq!(Frame::decode(&[0xFE, 0xFE, 0x68, 0x01]), Err(FrameError::Truncated(2)));
        assert_eq!(Frame::decode(&[]), Err(FrameError::Truncated(0)));
    }

    #[test]
    fn test_obfuscation_wraps() {
        assert_eq!(obfuscate(0xF0), 0x23);
        assert_eq!(reveal(0x10), 0xDD);
        assert_eq!(reveal(obfuscate(0x7F)), 0x7F);
    }
}
