//! `castep_bin` files written by the encoder and read back section by
//! section.

use ndarray::ShapeBuilder;
use xbin_decoder::{CastepBinDecoder, DecodeError, DecoderConfig, load_castep_bin};
use xbin_encoder::{CastepBinEncoder, EncoderConfig};
use xbin_tests::{silicon_cell, silicon_full};
use xbin_types::Section;
use xbin_wire::{ByteOrder, MarkerWidth, PayloadBuilder};

fn open(bytes: Vec<u8>) -> CastepBinDecoder<std::io::Cursor<Vec<u8>>> {
    CastepBinDecoder::new(std::io::Cursor::new(bytes), &DecoderConfig::default())
        .expect("sample should index")
}

#[test]
fn everything_roundtrips() {
    let data = silicon_full();
    let bytes = CastepBinEncoder::new().encode(&data).unwrap();
    assert_eq!(open(bytes).decode(&[]).unwrap(), data);
}

#[test]
fn shapes_follow_fortran_declarations() {
    let bytes = CastepBinEncoder::new().encode(&silicon_full()).unwrap();
    let data = open(bytes).decode(&[]).unwrap();

    assert_eq!(data.real_lattice.unwrap().shape(), &[3, 3]);
    assert_eq!(data.ionic_positions.unwrap().shape(), &[3, 2, 1]);
    assert_eq!(data.kpoints.unwrap().shape(), &[3, 2]);
    assert_eq!(data.forces.unwrap().shape(), &[3, 2, 1]);
    assert_eq!(data.born_charges.unwrap().shape(), &[3, 3, 2]);

    let gs = data.ground_state.unwrap();
    assert_eq!(gs.eigenvalues.shape(), &[4, 2, 2]);
    assert_eq!(gs.occupancies.shape(), &[4, 2, 2]);
    assert_eq!(gs.kpoints.shape(), &[3, 2]);
    assert!((gs.eigenvalues[[3, 1, 1]] - (-0.2 + 0.3 + 0.01 + 0.001)).abs() < 1e-12);
}

#[test]
fn fortran_element_order() {
    let bytes = CastepBinEncoder::new().encode(&silicon_cell()).unwrap();
    let data = open(bytes).decode(&[]).unwrap();
    let lattice = data.real_lattice.unwrap();
    // Lattice vectors are the columns: a(1, 2) is the x component of b.
    assert_eq!(lattice[[0, 1]], 10.26 / 2.0);
    assert_eq!(lattice[[0, 0]], 0.0);
    assert_eq!(data.ionic_positions.unwrap()[[2, 1, 0]], 0.25);
}

#[test]
fn requested_subset_plus_cell() {
    let bytes = CastepBinEncoder::new().encode(&silicon_full()).unwrap();
    let data = open(bytes).decode(&[Section::Forces]).unwrap();

    assert!(data.forces.is_some());
    assert!(data.real_lattice.is_some());
    assert_eq!(data.nkpts, Some(2));
    assert!(data.kpoints.is_none());
    assert!(data.born_charges.is_none());
    assert!(data.ground_state.is_none());
}

#[test]
fn absent_section_is_an_error() {
    let bytes = CastepBinEncoder::new().encode(&silicon_cell()).unwrap();
    let err = open(bytes).decode(&[Section::BornChgs]).unwrap_err();
    assert!(matches!(err, DecodeError::MissingSection { tag: "BORN_CHGS" }));
}

#[test]
fn kpoints_without_nkpts() {
    let mut data = silicon_cell();
    data.kpoints = Some(ndarray::Array2::zeros((3, 1).f()));
    let bytes = CastepBinEncoder::new().encode(&data).unwrap();
    let err = open(bytes).decode(&[Section::Kpoints]).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::MissingDimension {
            section: "KPOINTS",
            dimension: "NKPTS"
        }
    ));
}

#[test]
fn unknown_sections_are_indexed_and_ignored() {
    let order = ByteOrder::Big;
    let bytes = CastepBinEncoder::new()
        .add_raw_section("CELL%VOLUME", vec![PayloadBuilder::new(order).f64(270.0).build()])
        .add_raw_section("WAVEFUNCTION", vec![vec![0u8; 8192], vec![1u8; 8192]])
        .encode(&silicon_full())
        .unwrap();

    let mut d = open(bytes);
    let tags: Vec<&str> = d.tags().collect();
    assert!(tags.contains(&"CELL%VOLUME"));
    assert!(tags.contains(&"WAVEFUNCTION"));
    assert!(tags.contains(&"END_CELL_GLOBAL"));
    assert_eq!(d.decode(&[]).unwrap(), silicon_full());
}

#[test]
fn wide_markers_little_endian() {
    let config = EncoderConfig::default()
        .with_byte_order(ByteOrder::Little)
        .with_marker_width(MarkerWidth::Eight);
    let bytes = CastepBinEncoder::new()
        .with_config(config)
        .encode(&silicon_full())
        .unwrap();

    let decoder_config = DecoderConfig::default().with_marker_width(MarkerWidth::Eight);
    let mut d = CastepBinDecoder::new(std::io::Cursor::new(bytes), &decoder_config).unwrap();
    assert_eq!(d.decode(&[]).unwrap(), silicon_full());
}

#[test]
fn load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Si.castep_bin");
    std::fs::write(&path, CastepBinEncoder::new().encode(&silicon_full()).unwrap()).unwrap();

    let data = load_castep_bin(&path, &[Section::EndCellGlobal]).unwrap();
    let gs = data.ground_state.unwrap();
    assert!(gs.found_wavefunction);
    assert_eq!(gs.total_energy, -8.2839);
    assert_eq!((gs.nbands, gs.nspins), (4, 2));
}

#[test]
fn pdos_file_is_not_castep_bin() {
    let bytes = xbin_tests::sample_pdos(&xbin_tests::flat_header(1, 1, 1, 1), EncoderConfig::default());
    let err = CastepBinDecoder::new(std::io::Cursor::new(bytes), &DecoderConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, DecodeError::NotCastepBin { .. }));
}
