use ndarray::{ArrayBase, Data, Dimension};
use xbin_types::{CastepBinData, Section};
use xbin_wire::{PayloadBuilder, RecordWriter};

use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::pdos::to_i32;

/// Width of one `CELL%SPECIES_SYMBOL` entry.
pub const SPECIES_SYMBOL_LEN: usize = 8;

/// Writes `castep_bin` files from a [`CastepBinData`].
///
/// Each populated field becomes a tagged section, written in
/// [`Section::ALL`] order between the `CASTEP_BIN` magic record and the
/// `END` tag. Sections added with [`add_raw_section`](Self::add_raw_section)
/// go just before `END`; the decoder must skip them.
///
/// Arrays are written column-major, as Fortran would.
pub struct CastepBinEncoder {
    config: EncoderConfig,
    raw_sections: Vec<(String, Vec<Vec<u8>>)>,
}

impl Default for CastepBinEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CastepBinEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EncoderConfig::default(),
            raw_sections: Vec::new(),
        }
    }

    pub fn with_config(&mut self, config: EncoderConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Append a section with arbitrary, already-encoded record payloads.
    pub fn add_raw_section(&mut self, tag: &str, records: Vec<Vec<u8>>) -> &mut Self {
        self.raw_sections.push((tag.to_string(), records));
        self
    }

    /// Serialize `data` into a fresh buffer.
    ///
    /// # Errors
    ///
    /// [`EncodeError::CountOverflow`] for a count above `i32::MAX`;
    /// otherwise propagates wire and I/O errors.
    pub fn encode(&self, data: &CastepBinData) -> Result<Vec<u8>, EncodeError> {
        let order = self.config.byte_order;
        let mut out = RecordWriter::new(Vec::new(), order, self.config.marker_width)
            .with_max_subrecord_len(self.config.max_subrecord_len);
        let mut p = PayloadBuilder::new(order);

        out.write_record(b"CASTEP_BIN")?;

        for section in Section::ALL {
            if let Some(records) = section_records(section, data, &mut p)? {
                out.write_record(section.tag().as_bytes())?;
                for record in records {
                    out.write_record(&record)?;
                }
            }
        }

        for (tag, records) in &self.raw_sections {
            out.write_record(tag.as_bytes())?;
            for record in records {
                out.write_record(record)?;
            }
        }

        out.write_record(b"END")?;
        let bytes = out.into_inner();
        tracing::debug!(bytes = bytes.len(), "encoded castep_bin");
        Ok(bytes)
    }
}

/// Flatten an array in Fortran (column-major) order.
fn fortran_order<S, D, A>(a: &ArrayBase<S, D>) -> Vec<A>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: Copy,
{
    a.t().iter().copied().collect()
}

/// Records of one section, or `None` when `data` does not carry it.
#[allow(clippy::too_many_lines)]
fn section_records(
    section: Section,
    data: &CastepBinData,
    p: &mut PayloadBuilder,
) -> Result<Option<Vec<Vec<u8>>>, EncodeError> {
    let tag = section.tag();
    let scalar = |p: &mut PayloadBuilder, n: usize| -> Result<Vec<Vec<u8>>, EncodeError> {
        Ok(vec![p.i32(to_i32(tag, n)?).build()])
    };

    Ok(match section {
        Section::NumIons => data.num_ions.map(|n| scalar(p, n)).transpose()?,
        Section::MaxIonsInSpecies => data.max_ions_in_species.map(|n| scalar(p, n)).transpose()?,
        Section::NumSpecies => data.num_species.map(|n| scalar(p, n)).transpose()?,
        Section::Nkpts => data.nkpts.map(|n| scalar(p, n)).transpose()?,
        Section::RealLattice => data
            .real_lattice
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::RecipLattice => data
            .recip_lattice
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::NumIonsInSpecies => data
            .num_ions_in_species
            .as_ref()
            .map(|v| vec![p.i32s(v).build()]),
        Section::IonicPositions => data
            .ionic_positions
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::SpeciesSymbol => data.species_symbol.as_ref().map(|symbols| {
            for s in symbols {
                p.fixed_str(s, SPECIES_SYMBOL_LEN);
            }
            vec![p.build()]
        }),
        Section::Kpoints => data
            .kpoints
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::Forces => data
            .forces
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::ForceCon => data.force_constants.as_ref().map(|fc| {
            vec![
                p.i32s(&fortran_order(&fc.supercell_matrix)).build(),
                p.f64s(&fortran_order(&fc.matrix)).build(),
                p.i32s(&fortran_order(&fc.supercell_origins)).build(),
                p.i32(fc.row).build(),
            ]
        }),
        Section::BornChgs => data
            .born_charges
            .as_ref()
            .map(|a| vec![p.f64s(&fortran_order(a)).build()]),
        Section::EndCellGlobal => {
            let Some(gs) = data.ground_state.as_ref() else {
                return Ok(None);
            };
            let nbands = to_i32("number of bands", gs.nbands)?;
            let nspins = to_i32("number of spins", gs.nspins)?;
            let mut records = vec![
                p.i32(i32::from(gs.found_wavefunction)).build(),
                p.i32(i32::from(gs.found_density)).build(),
                p.f64(gs.total_energy).build(),
                p.f64(gs.fermi_energy).build(),
                p.i32(nbands).i32(nspins).build(),
            ];
            let nkpts = gs.kpoints.ncols();
            for k in 0..nkpts {
                records.push(p.f64s(&gs.kpoints.column(k).to_vec()).build());
                for s in 0..gs.nspins {
                    let occ = gs.occupancies.slice(ndarray::s![.., k, s]).to_vec();
                    let eig = gs.eigenvalues.slice(ndarray::s![.., k, s]).to_vec();
                    records.push(p.f64s(&occ).build());
                    records.push(p.f64s(&eig).build());
                }
            }
            Some(records)
        }
    })
}
