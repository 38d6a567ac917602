use std::io::{Read, Seek, SeekFrom, Write};

use crate::byte_order::{ByteOrder, MarkerWidth};
use crate::error::WireError;

/// One Fortran unformatted record, markers stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Stream position of the record's (first) leading marker.
    pub offset: u64,

    /// Payload bytes. Subrecords have already been concatenated.
    pub payload: Vec<u8>,
}

/// Record framing as written by a Fortran `WRITE` to an unformatted,
/// sequential-access unit.
///
/// ```text
/// ┌──────────────────┬─────────────────────┬──────────────────┐
/// │ marker (4 or 8)  │ payload [len bytes] │ marker (4 or 8)  │
/// └──────────────────┴─────────────────────┴──────────────────┘
/// ```
///
/// With 4-byte markers a payload longer than `i32::MAX` is split into
/// subrecords. A negative leading marker means the record continues in
/// the next subrecord; a negative trailing marker means a subrecord came
/// before it. Only magnitudes are compared between the two ends.
///
/// The reader needs `Seek` for two things: learning the stream length up
/// front, so a corrupt marker can never trigger a huge allocation, and
/// skipping over payloads that the caller does not care about.
pub struct RecordReader<R> {
    reader: R,
    order: ByteOrder,
    width: MarkerWidth,
    max_record_len: u64,
    position: u64,
    stream_len: u64,
}

impl<R: Read + Seek> RecordReader<R> {
    /// Bind a reader at its current position.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from seeking to measure the stream.
    pub fn new(mut reader: R, order: ByteOrder, width: MarkerWidth) -> Result<Self, WireError> {
        let position = reader.stream_position()?;
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(position))?;
        Ok(Self {
            reader,
            order,
            width,
            max_record_len: u64::MAX,
            position,
            stream_len,
        })
    }

    /// Reject any record whose total payload exceeds `limit` bytes.
    #[must_use]
    pub fn with_max_record_len(mut self, limit: u64) -> Self {
        self.max_record_len = limit;
        self
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    #[must_use]
    pub fn marker_width(&self) -> MarkerWidth {
        self.width
    }

    /// Current stream position, always on a record boundary between calls.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes between the current position and the end of the stream.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.stream_len.saturating_sub(self.position)
    }

    /// `true` once every byte of the stream has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Jump to an absolute offset, which must be a record boundary.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying seek.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), WireError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next record and advance past its trailing marker.
    ///
    /// # Errors
    ///
    /// - [`WireError::TruncatedRecord`] if the stream ends before the
    ///   trailing marker.
    /// - [`WireError::RecordLengthMismatch`] if the two markers differ.
    /// - [`WireError::RecordTooLarge`] if the payload exceeds the limit.
    /// - [`WireError::InvalidMarker`] for a negative 8-byte marker.
    pub fn read_next_record(&mut self) -> Result<Record, WireError> {
        let offset = self.position;
        let mut payload = Vec::new();
        self.walk_record(Some(&mut payload))?;
        tracing::trace!(offset, len = payload.len(), "read record");
        Ok(Record { offset, payload })
    }

    /// Advance past the next record without reading its payload.
    ///
    /// Both markers are still checked. Returns the payload length.
    ///
    /// # Errors
    ///
    /// Same as [`read_next_record`](Self::read_next_record).
    pub fn skip_record(&mut self) -> Result<u64, WireError> {
        let offset = self.position;
        let len = self.walk_record(None)?;
        tracing::trace!(offset, len, "skipped record");
        Ok(len)
    }

    /// Walk every subrecord of one logical record, appending payloads to
    /// `sink` when given, seeking over them otherwise.
    fn walk_record(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<u64, WireError> {
        let offset = self.position;
        let width = self.width.bytes() as u64;
        let mut total: u64 = 0;

        loop {
            let sub_offset = self.position;
            let leading = self.read_marker(offset)?;
            let (len, continued) = self.split_marker(leading, sub_offset)?;

            let so_far = total.saturating_add(len);
            if so_far > self.max_record_len {
                return Err(WireError::RecordTooLarge {
                    offset,
                    len: so_far,
                    limit: self.max_record_len,
                });
            }

            let available = self.remaining();
            let needed = len.saturating_add(width);
            if needed > available {
                return Err(WireError::TruncatedRecord {
                    offset,
                    expected: needed,
                    available,
                });
            }

            match sink.as_deref_mut() {
                Some(buf) => {
                    let start = buf.len();
                    let len_usize = usize::try_from(len).map_err(|_| WireError::RecordTooLarge {
                        offset,
                        len,
                        limit: usize::MAX as u64,
                    })?;
                    buf.resize(start + len_usize, 0);
                    self.reader.read_exact(&mut buf[start..])?;
                }
                None => {
                    // len <= remaining stream length, which always fits in i64
                    #[allow(clippy::cast_possible_wrap)]
                    self.reader.seek(SeekFrom::Current(len as i64))?;
                }
            }
            self.position += len;

            let trailing = self.read_marker(offset)?;
            let (trailing_len, _) = self.split_marker(trailing, sub_offset)?;
            if trailing_len != len {
                return Err(WireError::RecordLengthMismatch {
                    offset: sub_offset,
                    leading: len,
                    trailing: trailing_len,
                });
            }

            total = so_far;
            if !continued {
                return Ok(total);
            }
        }
    }

    fn read_marker(&mut self, record_offset: u64) -> Result<i64, WireError> {
        let width = self.width.bytes();
        let available = self.remaining();
        if available < width as u64 {
            return Err(WireError::TruncatedRecord {
                offset: record_offset,
                expected: width as u64,
                available,
            });
        }
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf[..width])?;
        self.position += width as u64;
        Ok(self.width.decode(&buf, self.order))
    }

    /// Marker value to `(payload length, continued)`.
    fn split_marker(&self, value: i64, offset: u64) -> Result<(u64, bool), WireError> {
        match self.width {
            MarkerWidth::Four => Ok((value.unsigned_abs(), value < 0)),
            MarkerWidth::Eight if value >= 0 => Ok((value.unsigned_abs(), false)),
            MarkerWidth::Eight => Err(WireError::InvalidMarker { offset, value }),
        }
    }
}

/// Guess the byte order from the first record at the reader's position.
///
/// Each order is tried in turn (big first, CASTEP's native order): the
/// leading marker must fit inside the stream and be matched by the
/// trailing marker. Markers are compared by magnitude, so a record split
/// into 4-byte-marker subrecords is recognised by its first piece; an
/// 8-byte marker must be non-negative. Returns `None` when neither order frames a record.
/// The reader is rewound to where it started either way.
///
/// # Errors
///
/// Propagates I/O errors.
pub fn detect_byte_order<R: Read + Seek>(
    reader: &mut R,
    width: MarkerWidth,
) -> Result<Option<ByteOrder>, WireError> {
    let start = reader.stream_position()?;
    let stream_len = reader.seek(SeekFrom::End(0))?;
    let w = width.bytes() as u64;

    let mut detected = None;
    if stream_len.saturating_sub(start) >= 2 * w {
        let mut leading = [0u8; 8];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut leading[..width.bytes()])?;

        for order in [ByteOrder::Big, ByteOrder::Little] {
            let marker = width.decode(&leading, order);
            if width == MarkerWidth::Eight && marker < 0 {
                continue;
            }
            let len = marker.unsigned_abs();
            let Some(end) = start
                .checked_add(w)
                .and_then(|p| p.checked_add(len))
                .and_then(|p| p.checked_add(w))
            else {
                continue;
            };
            if end > stream_len {
                continue;
            }
            let mut trailing = [0u8; 8];
            reader.seek(SeekFrom::Start(end - w))?;
            reader.read_exact(&mut trailing[..width.bytes()])?;
            if width.decode(&trailing, order).unsigned_abs() == len {
                detected = Some(order);
                break;
            }
        }
    }

    reader.seek(SeekFrom::Start(start))?;
    tracing::debug!(?detected, "byte order detection");
    Ok(detected)
}

/// Writes records in the layout [`RecordReader`] expects.
pub struct RecordWriter<W> {
    writer: W,
    order: ByteOrder,
    width: MarkerWidth,
    max_subrecord_len: u64,
}

impl<W: Write> RecordWriter<W> {
    #[must_use]
    pub fn new(writer: W, order: ByteOrder, width: MarkerWidth) -> Self {
        Self {
            writer,
            order,
            width,
            max_subrecord_len: width.max_len(),
        }
    }

    /// Split payloads into subrecords of at most `limit` bytes.
    ///
    /// Only meaningful for 4-byte markers; 8-byte records are never split.
    /// The limit is clamped to what a marker can express and to at least 1.
    #[must_use]
    pub fn with_max_subrecord_len(mut self, limit: u64) -> Self {
        self.max_subrecord_len = limit.clamp(1, self.width.max_len());
        self
    }

    /// Write one record. Returns the number of bytes written, markers
    /// included.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the writer.
    pub fn write_record(&mut self, payload: &[u8]) -> Result<usize, WireError> {
        let chunk_len = match self.width {
            MarkerWidth::Four => usize::try_from(self.max_subrecord_len).unwrap_or(usize::MAX),
            MarkerWidth::Eight => usize::MAX,
        };

        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(chunk_len).collect()
        };
        let last = chunks.len() - 1;

        let mut written = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            // A chunk is at most max_len() bytes, which fits in i64.
            #[allow(clippy::cast_possible_wrap)]
            let len = chunk.len() as i64;
            let leading = if i < last { -len } else { len };
            let trailing = if i > 0 { -len } else { len };

            let head = self.width.encode(leading, self.order);
            let tail = self.width.encode(trailing, self.order);
            self.writer.write_all(&head)?;
            self.writer.write_all(chunk)?;
            self.writer.write_all(&tail)?;
            written += head.len() + chunk.len() + tail.len();
        }
        Ok(written)
    }

    /// # Errors
    ///
    /// Propagates I/O errors from flushing.
    pub fn flush(&mut self) -> Result<(), WireError> {
        self.writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn write_all(order: ByteOrder, width: MarkerWidth, payloads: &[&[u8]]) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new(), order, width);
        for p in payloads {
            writer.write_record(p).unwrap();
        }
        writer.into_inner()
    }

    fn reader(bytes: Vec<u8>, order: ByteOrder, width: MarkerWidth) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::new(Cursor::new(bytes), order, width).unwrap()
    }

    #[test]
    fn sequential_records() {
        let bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[b"first", b"", b"third!"]);
        assert_eq!(bytes.len(), 3 * 8 + 5 + 6);

        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four);
        let first = r.read_next_record().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.payload, b"first");

        let empty = r.read_next_record().unwrap();
        assert_eq!(empty.offset, 13);
        assert!(empty.payload.is_empty());

        assert_eq!(r.read_next_record().unwrap().payload, b"third!");
        assert!(r.is_at_end());
    }

    #[test]
    fn big_endian_marker_layout() {
        let bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[&[0xAA; 3]]);
        assert_eq!(bytes, vec![0, 0, 0, 3, 0xAA, 0xAA, 0xAA, 0, 0, 0, 3]);
    }

    #[test]
    fn eight_byte_markers() {
        let bytes = write_all(ByteOrder::Little, MarkerWidth::Eight, &[b"abc", b"defg"]);
        assert_eq!(bytes.len(), 2 * 16 + 7);
        let mut r = reader(bytes, ByteOrder::Little, MarkerWidth::Eight);
        assert_eq!(r.read_next_record().unwrap().payload, b"abc");
        assert_eq!(r.read_next_record().unwrap().payload, b"defg");
    }

    #[test]
    fn subrecords_are_reassembled() {
        let payload: Vec<u8> = (0..=20).collect();
        let mut writer = RecordWriter::new(Vec::new(), ByteOrder::Big, MarkerWidth::Four)
            .with_max_subrecord_len(8);
        writer.write_record(&payload).unwrap();
        writer.write_record(b"next").unwrap();
        let bytes = writer.into_inner();

        // 21 bytes -> subrecords of 8, 8, 5
        assert_eq!(bytes.len(), 3 * 8 + 21 + 8 + 4);
        assert_eq!(&bytes[0..4], &(-8i32).to_be_bytes());

        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four);
        assert_eq!(r.read_next_record().unwrap().payload, payload);
        assert_eq!(r.read_next_record().unwrap().payload, b"next");
        assert!(r.is_at_end());
    }

    #[test]
    fn skip_record_validates_markers() {
        let bytes = write_all(ByteOrder::Little, MarkerWidth::Four, &[&[0u8; 600], b"tail"]);
        let mut r = reader(bytes, ByteOrder::Little, MarkerWidth::Four);
        assert_eq!(r.skip_record().unwrap(), 600);
        assert_eq!(r.position(), 608);
        assert_eq!(r.read_next_record().unwrap().payload, b"tail");
    }

    #[test]
    fn marker_mismatch() {
        let mut bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[b"hello"]);
        let n = bytes.len();
        bytes[n - 1] = 6;
        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four);
        let err = r.read_next_record().unwrap_err();
        assert!(matches!(
            err,
            WireError::RecordLengthMismatch {
                offset: 0,
                leading: 5,
                trailing: 6
            }
        ));
    }

    #[test]
    fn truncated_payload() {
        let mut bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[&[1u8; 32]]);
        bytes.truncate(20);
        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four);
        let err = r.read_next_record().unwrap_err();
        assert!(matches!(
            err,
            WireError::TruncatedRecord {
                offset: 0,
                expected: 36,
                available: 16
            }
        ));
    }

    #[test]
    fn truncated_trailing_marker() {
        let mut bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[b"abcd"]);
        bytes.truncate(10);
        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four);
        assert!(matches!(
            r.read_next_record(),
            Err(WireError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn record_limit() {
        let bytes = write_all(ByteOrder::Big, MarkerWidth::Four, &[&[0u8; 64]]);
        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Four).with_max_record_len(32);
        assert!(matches!(
            r.read_next_record(),
            Err(WireError::RecordTooLarge {
                len: 64,
                limit: 32,
                ..
            })
        ));
    }

    #[test]
    fn negative_eight_byte_marker_is_invalid() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-4i64).to_be_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        let mut r = reader(bytes, ByteOrder::Big, MarkerWidth::Eight);
        assert!(matches!(
            r.read_next_record(),
            Err(WireError::InvalidMarker { value: -4, .. })
        ));
    }

    #[test]
    fn detects_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let bytes = write_all(order, MarkerWidth::Four, &[&[0u8; 8], b"x"]);
            let mut cursor = Cursor::new(bytes);
            let detected = detect_byte_order(&mut cursor, MarkerWidth::Four).unwrap();
            assert_eq!(detected, Some(order));
            assert_eq!(cursor.position(), 0);
        }
    }

    #[test]
    fn detects_split_first_record() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let mut writer = RecordWriter::new(Vec::new(), order, MarkerWidth::Four).with_max_subrecord_len(4);
            writer.write_record(&[7u8; 10]).unwrap();
            let bytes = writer.into_inner();
            // The first subrecord opens with a negative marker.
            assert_eq!(order.read_i32([bytes[0], bytes[1], bytes[2], bytes[3]]), -4);

            let mut cursor = Cursor::new(bytes);
            assert_eq!(detect_byte_order(&mut cursor, MarkerWidth::Four).unwrap(), Some(order));
        }
    }

    #[test]
    fn detection_fails_on_garbage() {
        let mut cursor = Cursor::new(vec![0xFFu8, 0x00, 0x12, 0x34, 1, 2, 3, 4, 5]);
        assert_eq!(detect_byte_order(&mut cursor, MarkerWidth::Four).unwrap(), None);
    }
}
