//! Control byte of a DL/T 645 frame

use std::fmt;

const FUNCTION_MASK: u8 = 0x1F;
const FOLLOW_UP_FLAG: u8 = 0x20;
const ABNORMAL_FLAG: u8 = 0x40;
const REPLY_FLAG: u8 = 0x80;

/// DL/T 645 control code
///
/// The low five bits select the function. The three high bits are set by
/// the meter in its reply:
/// - bit 7: frame travels from meter to master
/// - bit 6: the meter refused the command (abnormal reply)
/// - bit 5: more data follows in a subsequent frame
///
/// The codec treats the byte as opaque; only callers interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlCode(u8);

impl ControlCode {
    /// Read data identified by a data identifier
    pub const READ_DATA: Self = Self(0x11);
    /// Change the meter's communication rate
    pub const CHANGE_BAUD_RATE: Self = Self(0x17);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Get the raw control byte
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Function bits without the direction and status flags
    pub const fn function(&self) -> u8 {
        self.0 & FUNCTION_MASK
    }

    /// Check if the frame was sent by a meter
    pub const fn is_reply(&self) -> bool {
        self.0 & REPLY_FLAG != 0
    }

    /// Check if the meter refused the command
    pub const fn is_abnormal(&self) -> bool {
        self.0 & ABNORMAL_FLAG != 0
    }

    /// Check if the meter announced a subsequent frame
    pub const fn has_follow_up(&self) -> bool {
        self.0 & FOLLOW_UP_FLAG != 0
    }
}

impl From<u8> for ControlCode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<ControlCode> for u8 {
    fn from(code: ControlCode) -> Self {
        code.0
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_flags() {
        let normal = ControlCode::new(0x91);
        assert!(normal.is_reply());
        assert!(!normal.is_abnormal());
        assert_eq!(normal.function(), ControlCode::READ_DATA.value());

        let refused = ControlCode::new(0xD1);
        assert!(refused.is_reply());
        assert!(refused.is_abnormal());
        assert!(!refused.has_follow_up());
    }

    #[test]
    fn test_request_is_not_reply() {
        assert!(!ControlCode::READ_DATA.is_reply());
        assert_eq!(ControlCode::CHANGE_BAUD_RATE.to_string(), "0x17");
    }
}
