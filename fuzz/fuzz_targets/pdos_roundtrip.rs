#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use xbin_decoder::{DecoderConfig, PdosDecoder};
use xbin_encoder::{EncoderConfig, PdosEncoder};
use xbin_types::PdosHeader;
use xbin_wire::{ByteOrder, MarkerWidth};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    num_kpoints: u8,
    two_spins: bool,
    num_orbitals: u8,
    max_bands: u8,
    little_endian: bool,
    wide_markers: bool,
    subrecord_len: u8,
    /// Band count per (k-point, spin), reduced modulo max_bands + 1.
    band_counts: Vec<u8>,
    seed: f64,
}

// Fuzz target: encode an arbitrary pdos_bin, decode it, compare.
//
// Catches bugs in:
// - Short band lists (num_eigenvalues < max_bands)
// - Subrecord splitting and reassembly
// - Byte-order detection on valid files of either order
fuzz_target!(|input: FuzzInput| {
    let nk = usize::from(input.num_kpoints % 4);
    let ns = if input.two_spins { 2 } else { 1 };
    let norb = usize::from(input.num_orbitals % 8) + 1;
    let nb = usize::from(input.max_bands % 6);

    let header = PdosHeader {
        version: 1.0,
        title: "fuzz".to_string(),
        num_kpoints: nk,
        num_spins: ns,
        num_orbitals: norb,
        max_bands: nb,
        species: vec![1; norb],
        ion: vec![1; norb],
        angular_momentum: vec![0; norb],
    };

    let mut expected = vec![0.0; nk * ns * nb * norb];
    let mut encoder = PdosEncoder::new(header);
    for k in 0..nk {
        let mut spins = Vec::new();
        for s in 0..ns {
            let count = input
                .band_counts
                .get(k * ns + s)
                .map_or(nb, |&c| usize::from(c) % (nb + 1));
            let mut bands = Vec::new();
            for b in 0..count {
                let row: Vec<f64> = (0..norb)
                    .map(|o| input.seed + (((k * ns + s) * nb + b) * norb + o) as f64)
                    .collect();
                let start = ((k * ns + s) * nb + b) * norb;
                expected[start..start + norb].copy_from_slice(&row);
                bands.push(row);
            }
            spins.push(bands);
        }
        encoder.add_kpoint([0.0; 3], spins);
    }

    let order = if input.little_endian { ByteOrder::Little } else { ByteOrder::Big };
    let width = if input.wide_markers { MarkerWidth::Eight } else { MarkerWidth::Four };
    encoder.with_config(
        EncoderConfig::default()
            .with_byte_order(order)
            .with_marker_width(width)
            .with_max_subrecord_len(u64::from(input.subrecord_len) + 1),
    );
    let bytes = encoder.encode().expect("valid input must encode");

    let config = DecoderConfig::default().with_marker_width(width);
    let decoded = PdosDecoder::from_bytes(&bytes, &config)
        .expect("decoder must open")
        .decode()
        .expect("encoded file must decode");

    let same = decoded
        .as_flat()
        .iter()
        .zip(&expected)
        .all(|(a, b)| a.to_bits() == b.to_bits());
    assert!(same && decoded.as_flat().len() == expected.len());
});
