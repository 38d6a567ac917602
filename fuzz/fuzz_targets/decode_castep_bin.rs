#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use xbin_decoder::{CastepBinDecoder, DecoderConfig};

// Fuzz target: CastepBinDecoder over arbitrary bytes.
//
// Catches bugs in:
// - Magic and tag recognition
// - Section dependency checks
// - FORCE_CON cell count inference
fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::default().with_max_record_len(1 << 20);
    if let Ok(mut decoder) = CastepBinDecoder::new(Cursor::new(data), &config) {
        let _ = decoder.decode(&[]);
    }
});
