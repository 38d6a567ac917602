use std::fmt;
use std::str::FromStr;

use crate::error::WireError;

/// Byte order of every multi-byte value in a file, markers included.
///
/// CASTEP writes big-endian on the platforms it is usually built for,
/// so that is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the machine we are running on.
    #[must_use]
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    #[must_use]
    pub fn read_i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            Self::Big => i32::from_be_bytes(bytes),
            Self::Little => i32::from_le_bytes(bytes),
        }
    }

    #[must_use]
    pub fn read_i64(self, bytes: [u8; 8]) -> i64 {
        match self {
            Self::Big => i64::from_be_bytes(bytes),
            Self::Little => i64::from_le_bytes(bytes),
        }
    }

    #[must_use]
    pub fn read_f64(self, bytes: [u8; 8]) -> f64 {
        match self {
            Self::Big => f64::from_be_bytes(bytes),
            Self::Little => f64::from_le_bytes(bytes),
        }
    }

    #[must_use]
    pub fn write_i32(self, value: i32) -> [u8; 4] {
        match self {
            Self::Big => value.to_be_bytes(),
            Self::Little => value.to_le_bytes(),
        }
    }

    #[must_use]
    pub fn write_i64(self, value: i64) -> [u8; 8] {
        match self {
            Self::Big => value.to_be_bytes(),
            Self::Little => value.to_le_bytes(),
        }
    }

    #[must_use]
    pub fn write_f64(self, value: f64) -> [u8; 8] {
        match self {
            Self::Big => value.to_be_bytes(),
            Self::Little => value.to_le_bytes(),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Big => f.write_str("big"),
            Self::Little => f.write_str("little"),
        }
    }
}

/// Byte order as requested by a caller: fixed, or detected from the
/// first record of the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrderSetting {
    Big,
    Little,
    #[default]
    Auto,
}

impl ByteOrderSetting {
    /// The fixed order, or `None` when detection is required.
    #[must_use]
    pub fn fixed(self) -> Option<ByteOrder> {
        match self {
            Self::Big => Some(ByteOrder::Big),
            Self::Little => Some(ByteOrder::Little),
            Self::Auto => None,
        }
    }
}

impl From<ByteOrder> for ByteOrderSetting {
    fn from(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Big => Self::Big,
            ByteOrder::Little => Self::Little,
        }
    }
}

impl FromStr for ByteOrderSetting {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "big" | "be" | ">" => Ok(Self::Big),
            "little" | "le" | "<" => Ok(Self::Little),
            "auto" => Ok(Self::Auto),
            _ => Err(WireError::UnsupportedByteOrder {
                name: s.to_string(),
            }),
        }
    }
}

/// Width of the length markers framing each record.
///
/// ifort and gfortran >= 4.2 use 4-byte markers; some older 64-bit
/// gfortran builds wrote 8-byte ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkerWidth {
    #[default]
    Four,
    Eight,
}

impl MarkerWidth {
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Decode a signed marker from exactly `self.bytes()` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than the marker width.
    #[must_use]
    pub fn decode(self, buf: &[u8], order: ByteOrder) -> i64 {
        match self {
            Self::Four => i64::from(order.read_i32([buf[0], buf[1], buf[2], buf[3]])),
            Self::Eight => order.read_i64([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
        }
    }

    /// Encode a signed marker. Values outside `i32` are the caller's
    /// problem for 4-byte markers; the writer splits records first.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(self, value: i64, order: ByteOrder) -> Vec<u8> {
        match self {
            Self::Four => order.write_i32(value as i32).to_vec(),
            Self::Eight => order.write_i64(value).to_vec(),
        }
    }

    /// Largest payload a single (sub)record can declare.
    #[must_use]
    pub fn max_len(self) -> u64 {
        match self {
            Self::Four => u64::from(i32::MAX.unsigned_abs()),
            Self::Eight => i64::MAX.unsigned_abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_settings() {
        assert_eq!("BIG".parse::<ByteOrderSetting>().unwrap(), ByteOrderSetting::Big);
        assert_eq!(" little ".parse::<ByteOrderSetting>().unwrap(), ByteOrderSetting::Little);
        assert_eq!("<".parse::<ByteOrderSetting>().unwrap(), ByteOrderSetting::Little);
        assert_eq!("auto".parse::<ByteOrderSetting>().unwrap(), ByteOrderSetting::Auto);
    }

    #[test]
    fn reject_unknown_setting() {
        let result = "middle".parse::<ByteOrderSetting>();
        assert!(matches!(
            result,
            Err(WireError::UnsupportedByteOrder { name }) if name == "middle"
        ));
    }

    #[test]
    fn markers_in_both_orders() {
        let be = MarkerWidth::Four.encode(28, ByteOrder::Big);
        assert_eq!(be, vec![0, 0, 0, 28]);
        assert_eq!(MarkerWidth::Four.decode(&be, ByteOrder::Big), 28);
        assert_eq!(MarkerWidth::Four.decode(&be, ByteOrder::Little), 28 << 24);

        let le = MarkerWidth::Eight.encode(-80, ByteOrder::Little);
        assert_eq!(le.len(), 8);
        assert_eq!(MarkerWidth::Eight.decode(&le, ByteOrder::Little), -80);
    }

    #[test]
    fn negative_four_byte_marker_keeps_sign() {
        let bytes = MarkerWidth::Four.encode(-12, ByteOrder::Big);
        assert_eq!(MarkerWidth::Four.decode(&bytes, ByteOrder::Big), -12);
    }

    #[test]
    fn f64_roundtrip_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let bytes = order.write_f64(-1.25e-3);
            assert_eq!(order.read_f64(bytes), -1.25e-3);
        }
    }
}
