//! Sample data shared by the integration tests, benches and the fixture
//! generator.
//!
//! Every weight is a function of its position, so a test can check any
//! element of a decoded file without keeping the input around:
//!
//! ```text
//!   weight(k, s, b, o) = 1000 k + 100 s + 10 b + o + 0.5
//! ```

#![allow(clippy::pedantic)]

use ndarray::{Array2, Array3, ShapeBuilder, array};
use xbin_encoder::{EncoderConfig, PdosEncoder};
use xbin_types::{CastepBinData, GroundState, PdosHeader};

/// Expected weight at `(k-point, spin, band, orbital)` in a sample file.
pub fn sample_weight(k: usize, s: usize, b: usize, o: usize) -> f64 {
    (1000 * k + 100 * s + 10 * b + o) as f64 + 0.5
}

/// A header with every orbital on one s-only atom.
pub fn flat_header(nk: usize, ns: usize, norb: usize, nb: usize) -> PdosHeader {
    PdosHeader {
        version: 23.1,
        title: format!("synthetic {nk}x{ns}x{nb}x{norb}"),
        num_kpoints: nk,
        num_spins: ns,
        num_orbitals: norb,
        max_bands: nb,
        species: vec![1; norb],
        ion: vec![1; norb],
        angular_momentum: vec![0; norb],
    }
}

/// Two silicon atoms, each projected onto s, px, py, pz.
pub fn silicon_header(nk: usize, ns: usize, nb: usize) -> PdosHeader {
    PdosHeader {
        version: 23.1,
        title: "Si2 diamond".to_string(),
        num_kpoints: nk,
        num_spins: ns,
        num_orbitals: 8,
        max_bands: nb,
        species: vec![1; 8],
        ion: vec![1, 1, 1, 1, 2, 2, 2, 2],
        angular_momentum: vec![0, 1, 1, 1, 0, 1, 1, 1],
    }
}

/// K-point positions used by the sample files.
pub fn sample_kpoint(k: usize) -> [f64; 3] {
    [0.125 * k as f64, 0.25, 0.0]
}

/// Encode a full `pdos_bin` file for `header` with [`sample_weight`]
/// values and every band present.
pub fn sample_pdos(header: &PdosHeader, config: EncoderConfig) -> Vec<u8> {
    let mut encoder = PdosEncoder::new(header.clone());
    encoder.with_config(config);
    for k in 0..header.num_kpoints {
        let spins = (0..header.num_spins)
            .map(|s| {
                (0..header.max_bands)
                    .map(|b| (0..header.num_orbitals).map(|o| sample_weight(k, s, b, o)).collect())
                    .collect()
            })
            .collect();
        encoder.add_kpoint(sample_kpoint(k), spins);
    }
    encoder
        .encode()
        .unwrap_or_else(|e| panic!("sample header {header} failed to encode: {e}"))
}

/// Cell sections of a two-atom silicon cell.
pub fn silicon_cell() -> CastepBinData {
    let a = 10.26;
    let real = array![[0.0, a / 2.0, a / 2.0], [a / 2.0, 0.0, a / 2.0], [a / 2.0, a / 2.0, 0.0]];
    let mut positions = Array3::zeros((3, 2, 1).f());
    for i in 0..3 {
        positions[[i, 1, 0]] = 0.25;
    }
    CastepBinData {
        num_ions: Some(2),
        max_ions_in_species: Some(2),
        real_lattice: Some(real),
        recip_lattice: Some(Array2::eye(3) * 0.6),
        num_species: Some(1),
        num_ions_in_species: Some(vec![2]),
        ionic_positions: Some(positions),
        species_symbol: Some(vec!["Si".to_string()]),
        ..CastepBinData::default()
    }
}

/// [`silicon_cell`] plus k-points, forces, Born charges and a
/// spin-polarised ground state.
pub fn silicon_full() -> CastepBinData {
    let nkpts = 2;
    let (nbands, nspins) = (4, 2);

    let mut data = silicon_cell();
    data.nkpts = Some(nkpts);
    data.kpoints = Some(Array2::from_shape_fn((3, nkpts).f(), |(i, k)| 0.25 * (i + k) as f64));
    data.forces = Some(Array3::from_shape_fn((3, 2, 1).f(), |(i, ion, _)| {
        if ion == 0 { 0.01 * i as f64 } else { -0.01 * i as f64 }
    }));
    data.born_charges = Some(Array3::from_shape_fn((3, 3, 2).f(), |(i, j, _)| {
        if i == j { -0.05 } else { 0.0 }
    }));
    data.ground_state = Some(GroundState {
        found_wavefunction: true,
        found_density: true,
        total_energy: -8.2839,
        fermi_energy: 0.2131,
        nbands,
        nspins,
        kpoints: data.kpoints.clone().unwrap_or_else(|| Array2::zeros((3, nkpts).f())),
        occupancies: Array3::from_shape_fn((nbands, nkpts, nspins).f(), |(b, _, _)| {
            if b < 2 { 1.0 } else { 0.0 }
        }),
        eigenvalues: Array3::from_shape_fn((nbands, nkpts, nspins).f(), |(b, k, s)| {
            -0.2 + 0.1 * b as f64 + 0.01 * k as f64 + 0.001 * s as f64
        }),
    });
    data
}
