use ndarray::{Array2, Array3, Array5};

/// Section tags of a `castep_bin` file that have a known layout.
///
/// A `castep_bin` file is one long run of Fortran records. Some of them
/// are short uppercase strings naming the data records that follow:
///
/// ```text
///   'CASTEP_BIN'
///   ...
///   'CELL%NUM_IONS'        ← tag
///   <i32>                  ← data
///   'CELL%REAL_LATTICE'
///   <f64 × 9>
///   ...
///   'END'
/// ```
///
/// `ALL` lists the sections in the order they are decoded. Later
/// sections take their dimensions from earlier ones, so the order
/// matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    NumIons,
    MaxIonsInSpecies,
    RealLattice,
    RecipLattice,
    NumSpecies,
    NumIonsInSpecies,
    IonicPositions,
    SpeciesSymbol,
    Nkpts,
    Kpoints,
    Forces,
    ForceCon,
    BornChgs,
    EndCellGlobal,
}

impl Section {
    pub const ALL: [Section; 14] = [
        Section::NumIons,
        Section::MaxIonsInSpecies,
        Section::RealLattice,
        Section::RecipLattice,
        Section::NumSpecies,
        Section::NumIonsInSpecies,
        Section::IonicPositions,
        Section::SpeciesSymbol,
        Section::Nkpts,
        Section::Kpoints,
        Section::Forces,
        Section::ForceCon,
        Section::BornChgs,
        Section::EndCellGlobal,
    ];

    /// The tag string as written in the file.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::NumIons => "CELL%NUM_IONS",
            Self::MaxIonsInSpecies => "CELL%MAX_IONS_IN_SPECIES",
            Self::RealLattice => "CELL%REAL_LATTICE",
            Self::RecipLattice => "CELL%RECIP_LATTICE",
            Self::NumSpecies => "CELL%NUM_SPECIES",
            Self::NumIonsInSpecies => "CELL%NUM_IONS_IN_SPECIES",
            Self::IonicPositions => "CELL%IONIC_POSITIONS",
            Self::SpeciesSymbol => "CELL%SPECIES_SYMBOL",
            Self::Nkpts => "NKPTS",
            Self::Kpoints => "KPOINTS",
            Self::Forces => "FORCES",
            Self::ForceCon => "FORCE_CON",
            Self::BornChgs => "BORN_CHGS",
            Self::EndCellGlobal => "END_CELL_GLOBAL",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }

    /// Cell sections are always decoded: everything else is shaped by them.
    #[must_use]
    pub fn is_cell(self) -> bool {
        self.tag().starts_with("CELL%")
    }
}

/// Phonon force constants from the `FORCE_CON` section.
#[derive(Clone, Debug, PartialEq)]
pub struct ForceConstants {
    /// Supercell matrix, shape `(3, 3)`.
    pub supercell_matrix: Array2<i32>,
    /// Shape `(3, num_ions, 3, num_ions, num_cells)`.
    pub matrix: Array5<f64>,
    /// Cell origins in the supercell, shape `(3, num_cells)`.
    pub supercell_origins: Array2<i32>,
    pub row: i32,
    /// Inferred from the size of the force constant record.
    pub num_cells: usize,
}

/// Ground-state results written after the `END_CELL_GLOBAL` tag.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundState {
    pub found_wavefunction: bool,
    pub found_density: bool,
    /// Hartree.
    pub total_energy: f64,
    /// Hartree.
    pub fermi_energy: f64,
    pub nbands: usize,
    pub nspins: usize,
    /// Shape `(3, nkpts)`, in the order the eigenvalues were written,
    /// which need not match `KPOINTS` when k-points were distributed.
    pub kpoints: Array2<f64>,
    /// Shape `(nbands, nkpts, nspins)`.
    pub occupancies: Array3<f64>,
    /// Shape `(nbands, nkpts, nspins)`, Hartree.
    pub eigenvalues: Array3<f64>,
}

/// Decoded contents of a `castep_bin` file.
///
/// Every field is optional: a section is only filled in when it was
/// present in the file and requested (cell sections are always
/// requested). Array shapes follow the Fortran declarations, with the
/// arrays built in Fortran order so `a[[i, j]]` is element `(i+1, j+1)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CastepBinData {
    pub num_ions: Option<usize>,
    pub max_ions_in_species: Option<usize>,
    /// Shape `(3, 3)`, Bohr.
    pub real_lattice: Option<Array2<f64>>,
    /// Shape `(3, 3)`, inverse Bohr.
    pub recip_lattice: Option<Array2<f64>>,
    pub num_species: Option<usize>,
    pub num_ions_in_species: Option<Vec<i32>>,
    /// Fractional, shape `(3, max_ions_in_species, num_species)`.
    pub ionic_positions: Option<Array3<f64>>,
    pub species_symbol: Option<Vec<String>>,
    pub nkpts: Option<usize>,
    /// Shape `(3, nkpts)`.
    pub kpoints: Option<Array2<f64>>,
    /// Shape `(3, max_ions_in_species, num_species)`.
    pub forces: Option<Array3<f64>>,
    pub force_constants: Option<ForceConstants>,
    /// Shape `(3, 3, num_ions)`.
    pub born_charges: Option<Array3<f64>>,
    pub ground_state: Option<GroundState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for section in Section::ALL {
            assert_eq!(Section::from_tag(section.tag()), Some(section));
        }
        assert_eq!(Section::from_tag("CASTEP_BIN"), None);
    }

    #[test]
    fn cell_sections_come_first() {
        let first_other = Section::ALL.iter().position(|s| !s.is_cell()).unwrap();
        assert!(Section::ALL[first_other..].iter().all(|s| !s.is_cell()));
        assert_eq!(first_other, 8);
    }
}
