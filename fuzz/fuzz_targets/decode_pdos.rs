#![no_main]

use libfuzzer_sys::fuzz_target;
use xbin_decoder::{DecoderConfig, PdosDecoder};

// Fuzz target: PdosDecoder::decode with arbitrary bytes.
//
// Catches bugs in:
// - Header count validation (negative, oversized)
// - Weight-phase truncation handling
// - Shape checks between header and weight records
fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::default().with_max_record_len(1 << 20);
    if let Ok(decoder) = PdosDecoder::from_bytes(data, &config) {
        let _ = decoder.decode();
    }
});
