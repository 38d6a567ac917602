use std::io::{Read, Seek};

use xbin_wire::{ByteOrder, ByteOrderSetting, MarkerWidth, detect_byte_order};

use crate::error::DecodeError;

/// Default cap on a single record's payload: 1 GiB.
pub const DEFAULT_MAX_RECORD_LEN: u64 = 1 << 30;

/// How to interpret the bytes of an input file.
///
/// ```text
/// ┌────────────────┬──────────┬────────────────────────────────────────┐
/// │ Field          │ Default  │ Purpose                                │
/// ├────────────────┼──────────┼────────────────────────────────────────┤
/// │ byte_order     │ Auto     │ fixed order, or detect from record 1   │
/// │ marker_width   │ Four     │ 4-byte (ifort, gfortran) or 8-byte     │
/// │ max_record_len │ 1 GiB    │ reject records declaring more bytes    │
/// └────────────────┴──────────┴────────────────────────────────────────┘
/// ```
///
/// ```rust
/// use xbin_decoder::DecoderConfig;
/// use xbin_wire::{ByteOrderSetting, MarkerWidth};
///
/// let config = DecoderConfig::default()
///     .with_byte_order("little".parse::<ByteOrderSetting>().unwrap())
///     .with_marker_width(MarkerWidth::Eight);
/// assert_eq!(config.byte_order, ByteOrderSetting::Little);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub byte_order: ByteOrderSetting,
    pub marker_width: MarkerWidth,
    pub max_record_len: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrderSetting::Auto,
            marker_width: MarkerWidth::Four,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

impl DecoderConfig {
    #[must_use]
    pub fn with_byte_order(mut self, setting: impl Into<ByteOrderSetting>) -> Self {
        self.byte_order = setting.into();
        self
    }

    #[must_use]
    pub fn with_marker_width(mut self, width: MarkerWidth) -> Self {
        self.marker_width = width;
        self
    }

    #[must_use]
    pub fn with_max_record_len(mut self, limit: u64) -> Self {
        self.max_record_len = limit;
        self
    }

    /// Settle on a concrete byte order for `reader`, running detection
    /// on the first record when configured as `Auto`.
    pub(crate) fn resolve_byte_order<R: Read + Seek>(
        &self,
        reader: &mut R,
    ) -> Result<ByteOrder, DecodeError> {
        if let Some(order) = self.byte_order.fixed() {
            return Ok(order);
        }
        detect_byte_order(reader, self.marker_width)?.ok_or_else(|| {
            DecodeError::UnsupportedByteOrder {
                reason: format!(
                    "first record is not framed by {}-byte markers in either byte order",
                    self.marker_width.bytes()
                ),
            }
        })
    }
}
