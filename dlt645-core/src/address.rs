use crate::error::{MeterError, MeterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bytes in a meter address
pub const ADDRESS_LENGTH: usize = 6;

/// DL/T 645 meter address
///
/// The address is derived from the 12-digit serial number printed on the
/// meter: each pair of hex digits becomes one byte, in reading order. On the
/// wire the bytes travel in reverse order (least significant pair first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterAddress {
    bytes: [u8; ADDRESS_LENGTH],
}

impl MeterAddress {
    /// Create an address from bytes in serial-number order
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Derive an address from a meter serial number
    ///
    /// # Arguments
    ///
    /// * `serial` - 12 hexadecimal characters, e.g. `"000012345678"`
    ///
    /// # Returns
    ///
    /// Returns `Err(MeterError::InvalidSerial)` if the serial number has the
    /// wrong length or contains non-hex characters.
    pub fn from_serial(serial: &str) -> MeterResult<Self> {
        let invalid = |reason: &str| MeterError::InvalidSerial {
            serial: serial.to_string(),
            reason: reason.to_string(),
        };

        if serial.len() != ADDRESS_LENGTH * 2 {
            return Err(invalid("expected 12 hexadecimal characters"));
        }
        // from_str_radix alone would let a leading '+' through
        if !serial.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("contains a non-hexadecimal character"));
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &serial[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| invalid("contains a non-hexadecimal character"))?;
        }

        Ok(Self { bytes })
    }

    /// Rebuild an address from its on-wire byte order
    pub fn from_wire(wire: [u8; ADDRESS_LENGTH]) -> Self {
        let mut bytes = wire;
        bytes.reverse();
        Self { bytes }
    }

    /// Get the address bytes in serial-number order
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.bytes
    }

    /// Get the address bytes in on-wire order
    pub fn to_wire(&self) -> [u8; ADDRESS_LENGTH] {
        let mut wire = self.bytes;
        wire.reverse();
        wire
    }
}

impl FromStr for MeterAddress {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_serial(s)
    }
}

impl fmt::Display for MeterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
