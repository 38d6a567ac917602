/// Errors raised while framing or reinterpreting Fortran unformatted records.
///
/// Every variant that can be tied to a position in the stream carries the
/// byte offset of the record's leading marker, which is usually the first
/// thing you want when staring at a hex dump of a broken file.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Leading and trailing length markers of a record disagree.
    #[error("record at offset {offset}: leading marker {leading} does not match trailing marker {trailing}")]
    RecordLengthMismatch {
        offset: u64,
        leading: u64,
        trailing: u64,
    },

    /// The stream ended before the record's trailing marker.
    ///
    /// `expected` is the number of bytes the record still needed
    /// (payload plus trailing marker); `available` is what was left.
    #[error("record at offset {offset} truncated: needed {expected} bytes, {available} available")]
    TruncatedRecord {
        offset: u64,
        expected: u64,
        available: u64,
    },

    /// A record declared a payload larger than the configured limit.
    #[error("record at offset {offset} declares {len} bytes, limit is {limit}")]
    RecordTooLarge { offset: u64, len: u64, limit: u64 },

    /// A marker value that cannot describe a record (e.g. a negative
    /// 8-byte marker, which has no subrecord meaning).
    #[error("invalid record marker {value} at offset {offset}")]
    InvalidMarker { offset: u64, value: i64 },

    /// Payload length is not a whole number of elements.
    #[error("payload of {len} bytes is not a multiple of element width {width}")]
    MisalignedPayload { len: usize, width: usize },

    /// A typed read ran past the end of a record payload.
    #[error("payload exhausted at byte {offset}: needed {needed}, {available} left")]
    PayloadExhausted {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Bytes left over after all expected fields of a record were read.
    #[error("{extra_bytes} unread bytes at end of record payload")]
    TrailingPayload { extra_bytes: usize },

    /// A byte-order name that is neither big, little nor auto.
    #[error("unsupported byte order {name:?}")]
    UnsupportedByteOrder { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
