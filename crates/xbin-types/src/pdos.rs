use std::fmt;

use ndarray::{Array2, Array4, ArrayView3};

use crate::error::TypeError;
use crate::orbital::Spin;

/// Width of the free-text header record in a `pdos_bin` file.
pub const TITLE_LEN: usize = 80;

/// Everything a `pdos_bin` file states before the first k-point.
///
/// The four counts fix the shape of the weights array. The three label
/// arrays have one entry per projected orbital and say which atom and
/// which angular momentum channel the orbital belongs to.
///
/// ```text
/// ┌───────────────────┬──────────────────────────────────────────────┐
/// │ Field             │ Meaning                                      │
/// ├───────────────────┼──────────────────────────────────────────────┤
/// │ version           │ file format version written by CASTEP        │
/// │ title             │ 80-char free text header                     │
/// │ num_kpoints       │ k-points in the spectral calculation         │
/// │ num_spins         │ 1 (unpolarised) or 2 (spin-polarised)        │
/// │ num_orbitals      │ projected orbitals over all atoms            │
/// │ max_bands         │ largest band count over all spins            │
/// │ species           │ species index of each orbital (1-based)      │
/// │ ion               │ ion index within its species (1-based)       │
/// │ angular_momentum  │ l channel of each orbital (0 = s ... 3 = f)  │
/// └───────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PdosHeader {
    pub version: f64,
    pub title: String,
    pub num_kpoints: usize,
    pub num_spins: usize,
    pub num_orbitals: usize,
    pub max_bands: usize,
    pub species: Vec<i32>,
    pub ion: Vec<i32>,
    pub angular_momentum: Vec<i32>,
}

impl PdosHeader {
    /// Shape of the weights array: `[k-point, spin, band, orbital]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 4] {
        [
            self.num_kpoints,
            self.num_spins,
            self.max_bands,
            self.num_orbitals,
        ]
    }

    /// Total number of weights the header promises, or `None` if the
    /// product of the counts does not fit in a `usize`.
    #[must_use]
    pub fn weight_count(&self) -> Option<usize> {
        self.shape().iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }

    /// Check the label arrays against `num_orbitals` and the spin count.
    ///
    /// # Errors
    ///
    /// [`TypeError::ShapeMismatch`] for a label array of the wrong length,
    /// [`TypeError::InvalidSpinCount`] unless there are 1 or 2 spins.
    pub fn validate(&self) -> Result<(), TypeError> {
        if !(1..=2).contains(&self.num_spins) {
            return Err(TypeError::InvalidSpinCount {
                value: self.num_spins,
            });
        }
        for (what, labels) in [
            ("species labels", &self.species),
            ("ion labels", &self.ion),
            ("angular momentum labels", &self.angular_momentum),
        ] {
            if labels.len() != self.num_orbitals {
                return Err(TypeError::ShapeMismatch {
                    what,
                    expected: self.num_orbitals,
                    found: labels.len(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for PdosHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pdos_bin v{}: {} k-points, {} spin(s), {} orbitals, {} bands",
            self.version, self.num_kpoints, self.num_spins, self.num_orbitals, self.max_bands
        )
    }
}

/// Decoded contents of a `pdos_bin` file.
///
/// Immutable once built: the decoder constructs it in one go at the end
/// of a successful read and hands it out by value.
///
/// The weights are stored row-major with shape
/// `(num_kpoints, num_spins, max_bands, num_orbitals)`, so walking the
/// flat slice visits k-point, then spin, then band, then orbital, with
/// orbital varying fastest. A spin channel may report fewer bands than
/// `max_bands` at some k-point; the missing bands stay zero and
/// [`num_eigenvalues`](Self::num_eigenvalues) tells you where they start.
#[derive(Clone, Debug, PartialEq)]
pub struct PdosWeights {
    header: PdosHeader,
    kpoint_positions: Array2<f64>,
    num_eigenvalues: Array2<usize>,
    weights: Array4<f64>,
}

impl PdosWeights {
    /// Assemble a result, checking every array against the header.
    ///
    /// - `kpoint_positions`: `(num_kpoints, 3)` fractional coordinates.
    /// - `num_eigenvalues`: `(num_kpoints, num_spins)` band counts.
    /// - `weights`: flat row-major data in k-point, spin, band, orbital
    ///   order, exactly [`PdosHeader::weight_count`] long.
    ///
    /// # Errors
    ///
    /// [`TypeError::ShapeMismatch`] when an array length does not match,
    /// or anything [`PdosHeader::validate`] rejects.
    pub fn new(
        header: PdosHeader,
        kpoint_positions: Vec<[f64; 3]>,
        num_eigenvalues: Vec<usize>,
        weights: Vec<f64>,
    ) -> Result<Self, TypeError> {
        header.validate()?;

        if kpoint_positions.len() != header.num_kpoints {
            return Err(TypeError::ShapeMismatch {
                what: "k-point positions",
                expected: header.num_kpoints,
                found: kpoint_positions.len(),
            });
        }
        let coords: Vec<f64> = kpoint_positions.into_iter().flatten().collect();
        let coords_len = coords.len();
        let kpoint_positions = Array2::from_shape_vec((header.num_kpoints, 3), coords)
            .map_err(|_| TypeError::ShapeMismatch {
                what: "k-point positions",
                expected: header.num_kpoints.saturating_mul(3),
                found: coords_len,
            })?;

        let counts_len = num_eigenvalues.len();
        let num_eigenvalues =
            Array2::from_shape_vec((header.num_kpoints, header.num_spins), num_eigenvalues)
                .map_err(|_| TypeError::ShapeMismatch {
                    what: "eigenvalue counts",
                    expected: header.num_kpoints.saturating_mul(header.num_spins),
                    found: counts_len,
                })?;

        let found = weights.len();
        let weights = Array4::from_shape_vec(header.shape(), weights).map_err(|_| {
            TypeError::ShapeMismatch {
                what: "pdos weights",
                expected: header.weight_count().unwrap_or(usize::MAX),
                found,
            }
        })?;

        Ok(Self {
            header,
            kpoint_positions,
            num_eigenvalues,
            weights,
        })
    }

    #[must_use]
    pub fn header(&self) -> &PdosHeader {
        &self.header
    }

    #[must_use]
    pub fn num_kpoints(&self) -> usize {
        self.header.num_kpoints
    }

    #[must_use]
    pub fn num_spins(&self) -> usize {
        self.header.num_spins
    }

    #[must_use]
    pub fn num_orbitals(&self) -> usize {
        self.header.num_orbitals
    }

    #[must_use]
    pub fn num_bands(&self) -> usize {
        self.header.max_bands
    }

    /// Fractional k-point coordinates, shape `(num_kpoints, 3)`.
    #[must_use]
    pub fn kpoint_positions(&self) -> &Array2<f64> {
        &self.kpoint_positions
    }

    /// Bands actually written per k-point and spin, shape
    /// `(num_kpoints, num_spins)`.
    #[must_use]
    pub fn num_eigenvalues(&self) -> &Array2<usize> {
        &self.num_eigenvalues
    }

    /// The full weights array, shape `(k-point, spin, band, orbital)`.
    #[must_use]
    pub fn weights(&self) -> &Array4<f64> {
        &self.weights
    }

    /// Weights in flat nesting order, orbital fastest.
    #[must_use]
    pub fn as_flat(&self) -> &[f64] {
        // Built by from_shape_vec with the default layout, so always contiguous.
        self.weights.as_slice().unwrap_or(&[])
    }

    /// One weight, or `None` if any index is out of range.
    #[must_use]
    pub fn weight(&self, kpoint: usize, spin: Spin, band: usize, orbital: usize) -> Option<f64> {
        self.weights
            .get([kpoint, spin.index(), band, orbital])
            .copied()
    }

    /// All weights of one spin channel, shape `(k-point, band, orbital)`.
    #[must_use]
    pub fn spin_channel(&self, spin: Spin) -> Option<ArrayView3<'_, f64>> {
        (spin.index() < self.header.num_spins)
            .then(|| self.weights.index_axis(ndarray::Axis(1), spin.index()))
    }
}
