use xbin_wire::{ByteOrder, MarkerWidth};

/// Layout knobs for the encoders.
///
/// ```text
/// ┌───────────────────┬──────────────┬─────────────────────────────────┐
/// │ Field             │ Default      │ Purpose                         │
/// ├───────────────────┼──────────────┼─────────────────────────────────┤
/// │ byte_order        │ Big          │ order of markers and values     │
/// │ marker_width      │ Four         │ 4- or 8-byte record markers     │
/// │ max_subrecord_len │ i32::MAX     │ split point for long records    │
/// └───────────────────┴──────────────┴─────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub byte_order: ByteOrder,
    pub marker_width: MarkerWidth,
    pub max_subrecord_len: u64,
}

impl Default for EncoderConfig {
    /// Big-endian with 4-byte markers, the layout CASTEP itself produces.
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Big,
            marker_width: MarkerWidth::Four,
            max_subrecord_len: MarkerWidth::Four.max_len(),
        }
    }
}

impl EncoderConfig {
    #[must_use]
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    #[must_use]
    pub fn with_marker_width(mut self, width: MarkerWidth) -> Self {
        self.marker_width = width;
        self.max_subrecord_len = self.max_subrecord_len.min(width.max_len());
        self
    }

    /// Force records longer than `limit` bytes to be split into subrecords.
    #[must_use]
    pub fn with_max_subrecord_len(mut self, limit: u64) -> Self {
        self.max_subrecord_len = limit;
        self
    }
}
