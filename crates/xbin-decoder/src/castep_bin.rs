use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use ndarray::{Array, Array3, Dimension, IntoDimension, ShapeBuilder};
use xbin_types::{CastepBinData, ForceConstants, GroundState, Section};
use xbin_wire::payload::clean_fortran_str;
use xbin_wire::{ByteOrder, PayloadReader, Record, RecordReader, decode_f64s, decode_i32s};

use crate::config::DecoderConfig;
use crate::error::DecodeError;

const MAGIC: &str = "CASTEP_BIN";
const END_TAG: &str = "END";

/// Records longer than this are never section tags and are skipped
/// without being read.
pub const MAX_TAG_LEN: u64 = 512;

const SPECIES_SYMBOL_LEN: usize = 8;

/// Reads selected sections of a `castep_bin` file.
///
/// Opening the decoder scans the whole file once, reading only the short
/// records, and remembers where each section tag is followed by data. A
/// tag written more than once resolves to its last occurrence.
/// [`decode`](Self::decode) then seeks straight to the requested sections.
pub struct CastepBinDecoder<R> {
    records: RecordReader<R>,
    offsets: HashMap<String, u64>,
}

impl<R: Read + Seek> CastepBinDecoder<R> {
    /// Check the magic record and index the section tags.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnsupportedByteOrder`] when `Auto` detection fails.
    /// - [`DecodeError::NotCastepBin`] if the first record is not `CASTEP_BIN`.
    /// - [`DecodeError::Wire`] for framing errors, including a file that
    ///   ends before the `END` tag.
    pub fn new(mut reader: R, config: &DecoderConfig) -> Result<Self, DecodeError> {
        let order = config.resolve_byte_order(&mut reader)?;
        let mut records = RecordReader::new(reader, order, config.marker_width)?
            .with_max_record_len(config.max_record_len);

        let first = records.read_next_record()?;
        let magic = clean_fortran_str(&first.payload);
        if magic != MAGIC {
            return Err(DecodeError::NotCastepBin { found: magic });
        }

        let mut offsets = HashMap::new();
        loop {
            let start = records.position();
            let len = records.skip_record()?;
            if len > MAX_TAG_LEN {
                continue;
            }
            records.seek_to(start)?;
            let record = records.read_next_record()?;
            let Some(tag) = as_tag(&record.payload) else {
                continue;
            };
            if tag == END_TAG {
                break;
            }
            if Section::from_tag(&tag).is_none() {
                tracing::trace!(tag = %tag, offset = start, "unknown section");
            }
            let data_at = records.position();
            if let Some(previous) = offsets.insert(tag, data_at) {
                tracing::debug!(offset = start, previous, "repeated section tag, keeping the later one");
            }
        }

        tracing::debug!(%order, sections = offsets.len(), "indexed castep_bin");
        Ok(Self { records, offsets })
    }

    /// Every tag found in the file, known or not.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_section(&self, section: Section) -> bool {
        self.offsets.contains_key(section.tag())
    }

    /// Decode `sections`, plus every cell section and `NKPTS` present in
    /// the file, since those give the others their shapes. An empty
    /// request decodes everything known.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MissingSection`] if a requested section is absent.
    /// - [`DecodeError::MissingDimension`] if a section's shape depends on
    ///   a dimension the file does not carry.
    /// - [`DecodeError::ShapeMismatch`] if a record's length disagrees
    ///   with the shape it should have.
    pub fn decode(&mut self, sections: &[Section]) -> Result<CastepBinData, DecodeError> {
        let requested: BTreeSet<Section> = sections.iter().copied().collect();
        let mut data = CastepBinData::default();

        for section in Section::ALL {
            let wanted = requested.is_empty()
                || requested.contains(&section)
                || section.is_cell()
                || section == Section::Nkpts;
            if !wanted {
                continue;
            }
            let Some(&offset) = self.offsets.get(section.tag()) else {
                if requested.contains(&section) {
                    return Err(DecodeError::MissingSection { tag: section.tag() });
                }
                continue;
            };
            self.records.seek_to(offset)?;
            self.decode_section(section, &mut data)?;
            tracing::trace!(tag = section.tag(), offset, "decoded section");
        }

        Ok(data)
    }

    fn decode_section(&mut self, section: Section, data: &mut CastepBinData) -> Result<(), DecodeError> {
        let tag = section.tag();
        match section {
            Section::NumIons => data.num_ions = Some(self.read_count(tag)?),
            Section::MaxIonsInSpecies => data.max_ions_in_species = Some(self.read_count(tag)?),
            Section::NumSpecies => data.num_species = Some(self.read_count(tag)?),
            Section::Nkpts => data.nkpts = Some(self.read_count(tag)?),
            Section::RealLattice => data.real_lattice = Some(self.read_f64_array(tag, (3, 3))?),
            Section::RecipLattice => data.recip_lattice = Some(self.read_f64_array(tag, (3, 3))?),
            Section::NumIonsInSpecies => {
                let ns = need(data.num_species, tag, "CELL%NUM_SPECIES")?;
                let record = self.records.read_next_record()?;
                let values = decode_i32s(&record.payload, self.order())?;
                check_len(tag, &record, ns, values.len())?;
                data.num_ions_in_species = Some(values);
            }
            Section::IonicPositions | Section::Forces => {
                let ni = need(data.max_ions_in_species, tag, "CELL%MAX_IONS_IN_SPECIES")?;
                let ns = need(data.num_species, tag, "CELL%NUM_SPECIES")?;
                let array: Array3<f64> = self.read_f64_array(tag, (3, ni, ns))?;
                if section == Section::Forces {
                    data.forces = Some(array);
                } else {
                    data.ionic_positions = Some(array);
                }
            }
            Section::SpeciesSymbol => {
                let ns = need(data.num_species, tag, "CELL%NUM_SPECIES")?;
                let record = self.records.read_next_record()?;
                let expected = ns
                    .checked_mul(SPECIES_SYMBOL_LEN)
                    .ok_or(DecodeError::ShapeTooLarge { what: tag })?;
                check_len(tag, &record, expected, record.payload.len())?;
                let mut p = PayloadReader::new(&record.payload, self.order());
                let symbols = (0..ns)
                    .map(|_| p.read_fixed_str(SPECIES_SYMBOL_LEN))
                    .collect::<Result<Vec<_>, _>>()?;
                data.species_symbol = Some(symbols);
            }
            Section::Kpoints => {
                let nk = need(data.nkpts, tag, "NKPTS")?;
                data.kpoints = Some(self.read_f64_array(tag, (3, nk))?);
            }
            Section::ForceCon => {
                let ni = need(data.num_ions, tag, "CELL%NUM_IONS")?;
                data.force_constants = Some(self.read_force_constants(ni)?);
            }
            Section::BornChgs => {
                let ni = need(data.num_ions, tag, "CELL%NUM_IONS")?;
                data.born_charges = Some(self.read_f64_array(tag, (3, 3, ni))?);
            }
            Section::EndCellGlobal => {
                let nk = need(data.nkpts, tag, "NKPTS")?;
                data.ground_state = Some(self.read_ground_state(nk)?);
            }
        }
        Ok(())
    }

    /// `FORCE_CON` carries no cell count of its own: it is whatever makes
    /// the force constant record `9 * num_ions^2 * num_cells` values long.
    fn read_force_constants(&mut self, num_ions: usize) -> Result<ForceConstants, DecodeError> {
        let tag = Section::ForceCon.tag();
        let order = self.order();

        let supercell_matrix = self.read_i32_array(tag, (3, 3))?;

        let record = self.records.read_next_record()?;
        let values = decode_f64s(&record.payload, order)?;
        let per_cell = num_ions
            .checked_mul(num_ions)
            .and_then(|n| n.checked_mul(9))
            .ok_or(DecodeError::ShapeTooLarge { what: "FORCE_CON matrix" })?;
        if per_cell == 0 || values.len() % per_cell != 0 {
            return Err(DecodeError::ShapeMismatch {
                what: "FORCE_CON matrix",
                offset: record.offset,
                expected: per_cell,
                found: values.len(),
            });
        }
        let num_cells = values.len() / per_cell;
        let matrix = fortran_array(tag, record.offset, values, (3, num_ions, 3, num_ions, num_cells))?;

        let supercell_origins = self.read_i32_array(tag, (3, num_cells))?;
        let row = scalar_i32(&self.records.read_next_record()?, order)?;

        tracing::debug!(num_cells, "decoded force constants");
        Ok(ForceConstants {
            supercell_matrix,
            matrix,
            supercell_origins,
            row,
            num_cells,
        })
    }

    /// Arrays are only built once every k-point record has been read, so
    /// `nbands` and `nspins` never size anything the stream does not hold.
    fn read_ground_state(&mut self, nkpts: usize) -> Result<GroundState, DecodeError> {
        let tag = Section::EndCellGlobal.tag();
        let order = self.order();

        let found_wavefunction = scalar_i32(&self.records.read_next_record()?, order)? != 0;
        let found_density = scalar_i32(&self.records.read_next_record()?, order)? != 0;
        let total_energy = scalar_f64(&self.records.read_next_record()?, order)?;
        let fermi_energy = scalar_f64(&self.records.read_next_record()?, order)?;

        let dims = self.records.read_next_record()?;
        let mut p = PayloadReader::new(&dims.payload, order);
        let nbands = to_count("number of bands", p.read_i32()?)?;
        let nspins = to_count("number of spins", p.read_i32()?)?;
        p.finish()?;

        let mut kpoints = Vec::new();
        // (k-point, spin) major, as written
        let mut occupancy_rows = Vec::new();
        let mut eigenvalue_rows = Vec::new();
        for _ in 0..nkpts {
            let record = self.records.read_next_record()?;
            let position = decode_f64s(&record.payload, order)?;
            check_len(tag, &record, 3, position.len())?;
            kpoints.extend(position);
            for _ in 0..nspins {
                for rows in [&mut occupancy_rows, &mut eigenvalue_rows] {
                    let record = self.records.read_next_record()?;
                    let values = decode_f64s(&record.payload, order)?;
                    check_len(tag, &record, nbands, values.len())?;
                    rows.push(values);
                }
            }
        }

        let kpoints = fortran_array(tag, dims.offset, kpoints, (3, nkpts))?;
        let occupancies = by_band_kpoint_spin(tag, dims.offset, &occupancy_rows, (nbands, nkpts, nspins))?;
        let eigenvalues = by_band_kpoint_spin(tag, dims.offset, &eigenvalue_rows, (nbands, nkpts, nspins))?;

        Ok(GroundState {
            found_wavefunction,
            found_density,
            total_energy,
            fermi_energy,
            nbands,
            nspins,
            kpoints,
            occupancies,
            eigenvalues,
        })
    }

    fn order(&self) -> ByteOrder {
        self.records.byte_order()
    }

    fn read_count(&mut self, tag: &'static str) -> Result<usize, DecodeError> {
        let record = self.records.read_next_record()?;
        to_count(tag, scalar_i32(&record, self.order())?)
    }

    fn read_f64_array<Sh: IntoDimension>(
        &mut self,
        tag: &'static str,
        shape: Sh,
    ) -> Result<Array<f64, Sh::Dim>, DecodeError> {
        let record = self.records.read_next_record()?;
        let values = decode_f64s(&record.payload, self.order())?;
        fortran_array(tag, record.offset, values, shape)
    }

    fn read_i32_array<Sh: IntoDimension>(
        &mut self,
        tag: &'static str,
        shape: Sh,
    ) -> Result<Array<i32, Sh::Dim>, DecodeError> {
        let record = self.records.read_next_record()?;
        let values = decode_i32s(&record.payload, self.order())?;
        fortran_array(tag, record.offset, values, shape)
    }
}

/// Build a column-major array, so `a[[i, j]]` is Fortran's `a(i+1, j+1)`.
fn fortran_array<A, Sh: IntoDimension>(
    what: &'static str,
    offset: u64,
    values: Vec<A>,
    shape: Sh,
) -> Result<Array<A, Sh::Dim>, DecodeError> {
    let dim = shape.into_dimension();
    let expected = dim.size_checked().ok_or(DecodeError::ShapeTooLarge { what })?;
    let found = values.len();
    let mismatch = DecodeError::ShapeMismatch {
        what,
        offset,
        expected,
        found,
    };
    if expected != found {
        return Err(mismatch);
    }
    Array::from_shape_vec(dim.f(), values).map_err(|_| mismatch)
}

/// Rows read per (k-point, spin), reordered into a Fortran
/// `(nbands, nkpts, nspins)` array.
fn by_band_kpoint_spin(
    what: &'static str,
    offset: u64,
    rows: &[Vec<f64>],
    (nbands, nkpts, nspins): (usize, usize, usize),
) -> Result<Array3<f64>, DecodeError> {
    let mut values = Vec::new();
    if !rows.is_empty() {
        for s in 0..nspins {
            for k in 0..nkpts {
                values.extend_from_slice(&rows[k * nspins + s]);
            }
        }
    }
    fortran_array(what, offset, values, (nbands, nkpts, nspins))
}

fn check_len(what: &'static str, record: &Record, expected: usize, found: usize) -> Result<(), DecodeError> {
    if expected == found {
        Ok(())
    } else {
        Err(DecodeError::ShapeMismatch {
            what,
            offset: record.offset,
            expected,
            found,
        })
    }
}

fn need(value: Option<usize>, section: &'static str, dimension: &'static str) -> Result<usize, DecodeError> {
    value.ok_or(DecodeError::MissingDimension { section, dimension })
}

fn scalar_i32(record: &Record, order: ByteOrder) -> Result<i32, DecodeError> {
    let mut p = PayloadReader::new(&record.payload, order);
    let value = p.read_i32()?;
    p.finish()?;
    Ok(value)
}

fn scalar_f64(record: &Record, order: ByteOrder) -> Result<f64, DecodeError> {
    let mut p = PayloadReader::new(&record.payload, order);
    let value = p.read_f64()?;
    p.finish()?;
    Ok(value)
}

fn to_count(what: &'static str, value: i32) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::InvalidDimension {
        what,
        value: i64::from(value),
    })
}

/// A section tag: an uppercase identifier such as `CELL%NUM_IONS`,
/// possibly blank-padded or quoted.
fn as_tag(payload: &[u8]) -> Option<String> {
    let text = clean_fortran_str(payload);
    let mut chars = text.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_uppercase()
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '_' | '%'));
    valid.then_some(text)
}

/// Decode `sections` of a `castep_bin` file with the default configuration.
///
/// Cell sections are always included; an empty slice decodes every known
/// section present in the file.
///
/// # Errors
///
/// I/O errors opening the file, plus anything [`CastepBinDecoder::new`] or
/// [`CastepBinDecoder::decode`] returns.
pub fn load_castep_bin(
    path: impl AsRef<Path>,
    sections: &[Section],
) -> Result<CastepBinData, DecodeError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading castep_bin");
    let file = BufReader::new(File::open(path)?);
    CastepBinDecoder::new(file, &DecoderConfig::default())?.decode(sections)
}
