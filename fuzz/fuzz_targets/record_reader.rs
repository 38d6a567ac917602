#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use xbin_wire::{detect_byte_order, ByteOrder, MarkerWidth, RecordReader};

// Fuzz target: RecordReader over arbitrary bytes, both marker widths.
//
// Catches bugs in:
// - Marker sign handling and subrecord chaining
// - Length checks against the remaining stream (no huge allocations)
// - Byte-order detection on short or garbage input
fuzz_target!(|data: &[u8]| {
    for width in [MarkerWidth::Four, MarkerWidth::Eight] {
        let mut cursor = Cursor::new(data);
        let order = detect_byte_order(&mut cursor, width)
            .ok()
            .flatten()
            .unwrap_or(ByteOrder::Big);
        let Ok(reader) = RecordReader::new(cursor, order, width) else {
            continue;
        };
        let mut reader = reader.with_max_record_len(1 << 20);
        while !reader.is_at_end() {
            if reader.read_next_record().is_err() {
                break;
            }
        }
    }
});
