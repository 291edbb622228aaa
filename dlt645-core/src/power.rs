//! Power value decoding
//!
//! A power reply carries the value in its last three payload bytes as packed
//! BCD, least significant byte first, with four implied fraction digits
//! (`XX.XXXX`). Bytes `[0x01, 0x23, 0x45]` therefore read as `45.2301`.

use crate::error::{MeterError, MeterResult};

/// Number of trailing payload bytes holding the power value
pub const POWER_FIELD_LENGTH: usize = 3;

/// Fraction digits carried by the wire value
const WIRE_FRACTION_DIGITS: u32 = 4;

/// Fraction digits kept in the returned integer (milli-units)
const MILLI_FRACTION_DIGITS: u32 = 3;

/// Decode the power value at the end of a read-power reply payload
///
/// # Arguments
///
/// * `payload` - De-obfuscated reply payload (data identifier followed by the value)
///
/// # Returns
///
/// The power in milli-units, i.e. the decimal value scaled by 1000 and
/// truncated toward zero. Fails if fewer than three bytes are present or a
/// nibble is not a decimal digit.
///
/// The scaling is exact integer arithmetic, so it can differ by one from
/// parsing the value as a float and truncating `value * 1000`: `01.0010`
/// gives 1001 here, where float truncation gives 1000.
pub fn decode_power(payload: &[u8]) -> MeterResult<u32> {
    if payload.len() < POWER_FIELD_LENGTH {
        return Err(MeterError::InvalidData(format!(
            "Power payload too short: expected at least {} bytes, got {}",
            POWER_FIELD_LENGTH,
            payload.len()
        )));
    }

    let field = &payload[payload.len() - POWER_FIELD_LENGTH..];
    let mut digits: u32 = 0;
    for &byte in field.iter().rev() {
        let (high, low) = (byte >> 4, byte & 0x0F);
        if high > 9 || low > 9 {
            return Err(MeterError::InvalidData(format!(
                "Power field is not BCD: {:02X?}",
                field
            )));
        }
        digits = digits * 100 + u32::from(high) * 10 + u32::from(low);
    }

    Ok(digits / 10u32.pow(WIRE_FRACTION_DIGITS - MILLI_FRACTION_DIGITS))
}
