use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use xbin_types::{PdosHeader, PdosWeights};
use xbin_wire::{ByteOrder, PayloadReader, Record, RecordReader, WireError, decode_f64s, decode_i32s};

use crate::config::DecoderConfig;
use crate::error::DecodeError;

/// Where the weights phase currently is, for [`DecodeError::UnexpectedEof`].
#[derive(Clone, Copy)]
struct Position {
    record: &'static str,
    kpoint: usize,
    spin: usize,
    band: usize,
}

/// Reads a `pdos_bin` file: header first, then the k-point blocks.
///
/// The decoder owns its reader for the duration of the decode. Header and
/// weights can be read in two steps, which is handy when only the
/// dimensions are needed:
///
/// ```rust
/// use xbin_decoder::{DecoderConfig, PdosDecoder};
/// use xbin_encoder::PdosEncoder;
/// use xbin_types::PdosHeader;
///
/// let header = PdosHeader {
///     version: 1.0,
///     title: "demo".into(),
///     num_kpoints: 1,
///     num_spins: 1,
///     num_orbitals: 1,
///     max_bands: 1,
///     species: vec![1],
///     ion: vec![1],
///     angular_momentum: vec![0],
/// };
/// let bytes = PdosEncoder::new(header)
///     .add_kpoint([0.0; 3], vec![vec![vec![1.0]]])
///     .encode()
///     .unwrap();
///
/// let mut decoder = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default()).unwrap();
/// let header = decoder.decode_pdos_header().unwrap();
/// assert_eq!(header.shape(), [1, 1, 1, 1]);
/// let weights = decoder.decode_pdos_weights(header).unwrap();
/// assert_eq!(weights.as_flat(), &[1.0]);
/// ```
pub struct PdosDecoder<R> {
    records: RecordReader<R>,
}

impl<'a> PdosDecoder<Cursor<&'a [u8]>> {
    /// Decode from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Same as [`PdosDecoder::new`].
    pub fn from_bytes(bytes: &'a [u8], config: &DecoderConfig) -> Result<Self, DecodeError> {
        Self::new(Cursor::new(bytes), config)
    }
}

impl<R: Read + Seek> PdosDecoder<R> {
    /// Bind a reader, resolving the byte order first.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnsupportedByteOrder`] when `Auto` detection fails,
    /// or an I/O error.
    pub fn new(mut reader: R, config: &DecoderConfig) -> Result<Self, DecodeError> {
        let order = config.resolve_byte_order(&mut reader)?;
        let records = RecordReader::new(reader, order, config.marker_width)?
            .with_max_record_len(config.max_record_len);
        tracing::debug!(%order, marker_width = config.marker_width.bytes(), "opened pdos_bin");
        Ok(Self { records })
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.records.byte_order()
    }

    /// Read the nine header records.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidDimension`] for a negative count or a spin
    ///   count other than 1 or 2.
    /// - [`DecodeError::ShapeMismatch`] for a label record of the wrong
    ///   length.
    /// - [`DecodeError::Wire`] for framing errors, including truncation.
    pub fn decode_pdos_header(&mut self) -> Result<PdosHeader, DecodeError> {
        let order = self.byte_order();

        let record = self.records.read_next_record()?;
        let mut p = PayloadReader::new(&record.payload, order);
        let version = p.read_f64()?;
        p.finish()?;

        let record = self.records.read_next_record()?;
        let title = PayloadReader::new(&record.payload, order).read_fixed_str(record.payload.len())?;

        let num_kpoints = self.read_count("number of k-points")?;
        let num_spins = self.read_count("number of spins")?;
        if !(1..=2).contains(&num_spins) {
            return Err(DecodeError::InvalidDimension {
                what: "number of spins",
                value: i64::try_from(num_spins).unwrap_or(i64::MAX),
            });
        }
        let num_orbitals = self.read_count("number of orbitals")?;
        let max_bands = self.read_count("maximum number of bands")?;

        let species = self.read_labels("species labels", num_orbitals)?;
        let ion = self.read_labels("ion labels", num_orbitals)?;
        let angular_momentum = self.read_labels("angular momentum labels", num_orbitals)?;

        let header = PdosHeader {
            version,
            title,
            num_kpoints,
            num_spins,
            num_orbitals,
            max_bands,
            species,
            ion,
            angular_momentum,
        };
        tracing::debug!(%header, "decoded pdos header");
        Ok(header)
    }

    /// Read every k-point block that `header` promises.
    ///
    /// Weights land in the nesting order k-point, spin, band, orbital.
    /// Bands past a spin's `num_eigenvalues` are left at zero.
    ///
    /// Nothing is sized from the header counts until every record has
    /// been read, so a header that promises more than the stream holds
    /// fails with [`DecodeError::UnexpectedEof`] rather than allocating.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnexpectedEof`] if the stream runs out first.
    /// - [`DecodeError::InvalidDimension`] if a spin reports more bands
    ///   than `max_bands`, or a negative count.
    /// - [`DecodeError::ShapeTooLarge`] if the header's shape cannot be
    ///   allocated.
    /// - [`DecodeError::ShapeMismatch`] if a weights record does not hold
    ///   exactly `num_orbitals` values.
    pub fn decode_pdos_weights(&mut self, header: PdosHeader) -> Result<PdosWeights, DecodeError> {
        let order = self.byte_order();
        let [nk, ns, nb, norb] = header.shape();

        let mut positions = Vec::new();
        let mut num_eigenvalues = Vec::new();
        // One entry per (k-point, spin): the bands actually written.
        let mut blocks: Vec<Vec<f64>> = Vec::new();

        for k in 0..nk {
            let mut at = Position {
                record: "k-point position",
                kpoint: k,
                spin: 0,
                band: 0,
            };
            let record = self.weight_record(at)?;
            let mut p = PayloadReader::new(&record.payload, order);
            let index = p.read_i32()?;
            let coords = p.read_f64s(3)?;
            p.finish()?;
            if usize::try_from(index).ok() != Some(k + 1) {
                tracing::warn!(expected = k + 1, found = index, "unexpected k-point index");
            }
            positions.push([coords[0], coords[1], coords[2]]);

            for s in 0..ns {
                at.spin = s;
                at.record = "spin index";
                let record = self.weight_record(at)?;
                let spin_index = scalar_i32(&record, order)?;
                if usize::try_from(spin_index).ok() != Some(s + 1) {
                    tracing::warn!(kpoint = k, expected = s + 1, found = spin_index, "unexpected spin index");
                }

                at.record = "eigenvalue count";
                let record = self.weight_record(at)?;
                let bands = to_count("number of eigenvalues", scalar_i32(&record, order)?)?;
                if bands > nb {
                    return Err(DecodeError::InvalidDimension {
                        what: "number of eigenvalues",
                        value: i64::try_from(bands).unwrap_or(i64::MAX),
                    });
                }
                if bands < nb {
                    tracing::trace!(kpoint = k, spin = s, bands, max_bands = nb, "short band list");
                }
                num_eigenvalues.push(bands);

                at.record = "orbital weights";
                let mut block = Vec::new();
                for b in 0..bands {
                    at.band = b;
                    let record = self.weight_record(at)?;
                    let values = decode_f64s(&record.payload, order)?;
                    if values.len() != norb {
                        return Err(DecodeError::ShapeMismatch {
                            what: "orbital weights",
                            offset: record.offset,
                            expected: norb,
                            found: values.len(),
                        });
                    }
                    block.extend_from_slice(&values);
                }
                blocks.push(block);
            }
        }

        if !self.records.is_at_end() {
            tracing::warn!(
                trailing_bytes = self.records.remaining(),
                "data after the last k-point ignored"
            );
        }

        let weights = dense_weights(&header, &blocks)?;
        let result = PdosWeights::new(header, positions, num_eigenvalues, weights)?;
        tracing::debug!(weights = result.as_flat().len(), "decoded pdos weights");
        Ok(result)
    }

    /// Header then weights.
    ///
    /// # Errors
    ///
    /// Anything [`decode_pdos_header`](Self::decode_pdos_header) or
    /// [`decode_pdos_weights`](Self::decode_pdos_weights) returns.
    pub fn decode(mut self) -> Result<PdosWeights, DecodeError> {
        let header = self.decode_pdos_header()?;
        self.decode_pdos_weights(header)
    }

    fn read_count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let record = self.records.read_next_record()?;
        to_count(what, scalar_i32(&record, self.byte_order())?)
    }

    fn read_labels(&mut self, what: &'static str, len: usize) -> Result<Vec<i32>, DecodeError> {
        let record = self.records.read_next_record()?;
        let labels = decode_i32s(&record.payload, self.byte_order())?;
        if labels.len() != len {
            return Err(DecodeError::ShapeMismatch {
                what,
                offset: record.offset,
                expected: len,
                found: labels.len(),
            });
        }
        Ok(labels)
    }

    /// Next record of the k-point blocks. Running out of stream here,
    /// cleanly or mid-record, is an [`DecodeError::UnexpectedEof`].
    fn weight_record(&mut self, at: Position) -> Result<Record, DecodeError> {
        let eof = |offset| DecodeError::UnexpectedEof {
            record: at.record,
            kpoint: at.kpoint,
            spin: at.spin,
            band: at.band,
            offset,
        };
        if self.records.is_at_end() {
            return Err(eof(self.records.position()));
        }
        match self.records.read_next_record() {
            Ok(record) => Ok(record),
            Err(WireError::TruncatedRecord { offset, .. }) => Err(eof(offset)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Lay the per-(k-point, spin) blocks out in the full `max_bands` grid,
/// zero-padding short band lists.
fn dense_weights(header: &PdosHeader, blocks: &[Vec<f64>]) -> Result<Vec<f64>, DecodeError> {
    let too_large = || DecodeError::ShapeTooLarge { what: "pdos weights" };
    let count = header.weight_count().ok_or_else(too_large)?;
    // Nonzero count bounds every partial product.
    let stride = if count == 0 { 0 } else { header.max_bands * header.num_orbitals };

    let mut weights = Vec::new();
    weights.try_reserve_exact(count).map_err(|_| too_large())?;
    weights.resize(count, 0.0);
    for (n, block) in blocks.iter().enumerate() {
        let start = n * stride;
        weights[start..start + block.len()].copy_from_slice(block);
    }
    Ok(weights)
}

fn scalar_i32(record: &Record, order: ByteOrder) -> Result<i32, DecodeError> {
    let mut p = PayloadReader::new(&record.payload, order);
    let value = p.read_i32()?;
    p.finish()?;
    Ok(value)
}

fn to_count(what: &'static str, value: i32) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::InvalidDimension {
        what,
        value: i64::from(value),
    })
}

/// Decode a `pdos_bin` file with the default configuration.
///
/// # Errors
///
/// I/O errors opening the file, plus anything [`PdosDecoder::decode`]
/// returns.
pub fn load_pdos(path: impl AsRef<Path>) -> Result<PdosWeights, DecodeError> {
    load_pdos_with(path, &DecoderConfig::default())
}

/// Decode a `pdos_bin` file with an explicit configuration.
///
/// # Errors
///
/// I/O errors opening the file, plus anything [`PdosDecoder::decode`]
/// returns.
pub fn load_pdos_with(
    path: impl AsRef<Path>,
    config: &DecoderConfig,
) -> Result<PdosWeights, DecodeError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading pdos_bin");
    let file = BufReader::new(File::open(path)?);
    PdosDecoder::new(file, config)?.decode()
}

#[cfg(test)]
mod tests {
    use xbin_encoder::{EncoderConfig, PdosEncoder};
    use xbin_wire::{ByteOrderSetting, MarkerWidth, RecordWriter};

    use super::*;

    fn header(nk: usize, ns: usize, norb: usize, nb: usize) -> PdosHeader {
        PdosHeader {
            version: 1.0,
            title: "decoder test".to_string(),
            num_kpoints: nk,
            num_spins: ns,
            num_orbitals: norb,
            max_bands: nb,
            species: vec![1; norb],
            ion: vec![1; norb],
            angular_momentum: vec![0; norb],
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn full_file(h: &PdosHeader, config: EncoderConfig) -> Vec<u8> {
        let mut enc = PdosEncoder::new(h.clone());
        enc.with_config(config);
        let mut next = 0.0;
        for _ in 0..h.num_kpoints {
            let spins = (0..h.num_spins)
                .map(|_| {
                    (0..h.max_bands)
                        .map(|_| {
                            (0..h.num_orbitals)
                                .map(|_| {
                                    next += 1.0;
                                    next
                                })
                                .collect()
                        })
                        .collect()
                })
                .collect();
            enc.add_kpoint([0.5, 0.25, 0.0], spins);
        }
        enc.encode().unwrap()
    }

    #[test]
    fn twenty_four_weights_in_nesting_order() {
        let h = header(2, 1, 3, 4);
        let bytes = full_file(&h, EncoderConfig::default());
        let w = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(w.as_flat().len(), 24);
        #[allow(clippy::cast_precision_loss)]
        let expected: Vec<f64> = (1..=24).map(|i| i as f64).collect();
        assert_eq!(w.as_flat(), expected.as_slice());
        assert_eq!(w.kpoint_positions().row(1).to_vec(), vec![0.5, 0.25, 0.0]);
    }

    #[test]
    fn header_only() {
        let h = header(3, 2, 5, 7);
        let bytes = full_file(&h, EncoderConfig::default());
        let mut d = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default()).unwrap();
        assert_eq!(d.decode_pdos_header().unwrap(), h);
    }

    #[test]
    fn little_endian_is_detected() {
        let h = header(1, 2, 2, 2);
        let bytes = full_file(&h, EncoderConfig::default().with_byte_order(ByteOrder::Little));
        let d = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default()).unwrap();
        assert_eq!(d.byte_order(), ByteOrder::Little);
        assert_eq!(d.decode().unwrap().as_flat().len(), 8);
    }

    #[test]
    fn wrong_fixed_order_is_rejected() {
        let h = header(1, 1, 1, 1);
        let bytes = full_file(&h, EncoderConfig::default());
        let config = DecoderConfig::default().with_byte_order(ByteOrderSetting::Little);
        let err = PdosDecoder::from_bytes(&bytes, &config)
            .unwrap()
            .decode()
            .unwrap_err();
        // 8 read as little-endian is far larger than the stream.
        assert!(matches!(
            err,
            DecodeError::Wire(WireError::TruncatedRecord { offset: 0, .. })
        ));
    }

    #[test]
    fn truncated_weights_report_position() {
        let h = header(2, 1, 3, 4);
        let bytes = full_file(&h, EncoderConfig::default());
        // Drop the last weights record (3 f64 + two markers) and half of
        // the one before it.
        let cut = bytes.len() - 32 - 16;
        let err = PdosDecoder::from_bytes(&bytes[..cut], &DecoderConfig::default())
            .unwrap()
            .decode()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedEof {
                record: "orbital weights",
                kpoint: 1,
                spin: 0,
                band: 2,
                ..
            }
        ));
    }

    #[test]
    fn clean_eof_between_records() {
        let h = header(2, 1, 3, 4);
        let bytes = full_file(&h, EncoderConfig::default());
        let cut = bytes.len() - 32;
        let err = PdosDecoder::from_bytes(&bytes[..cut], &DecoderConfig::default())
            .unwrap()
            .decode()
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { band: 3, .. }));
    }

    #[test]
    fn short_band_lists_stay_zero() {
        let h = header(1, 1, 2, 3);
        let bytes = PdosEncoder::new(h)
            .add_kpoint([0.0; 3], vec![vec![vec![1.0, 2.0]]])
            .encode()
            .unwrap();
        let w = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(w.as_flat(), &[1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(w.num_eigenvalues()[[0, 0]], 1);
    }

    /// Hand-built header with one count record replaced.
    fn header_with_counts(counts: [i32; 4]) -> Vec<u8> {
        let order = ByteOrder::Big;
        let mut w = RecordWriter::new(Vec::new(), order, MarkerWidth::Four);
        w.write_record(&order.write_f64(1.0)).unwrap();
        w.write_record(&[b' '; 80]).unwrap();
        for c in counts {
            w.write_record(&order.write_i32(c)).unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn negative_count_is_invalid() {
        let bytes = header_with_counts([1, 1, -2, 1]);
        let err = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode_pdos_header()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidDimension {
                what: "number of orbitals",
                value: -2
            }
        ));
    }

    #[test]
    fn three_spins_is_invalid() {
        let bytes = header_with_counts([1, 3, 1, 1]);
        let err = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode_pdos_header()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidDimension {
                what: "number of spins",
                value: 3
            }
        ));
    }

    #[test]
    fn short_label_record_is_a_shape_mismatch() {
        let order = ByteOrder::Big;
        let mut bytes = header_with_counts([1, 1, 2, 1]);
        let mut w = RecordWriter::new(Vec::new(), order, MarkerWidth::Four);
        w.write_record(&order.write_i32(1)).unwrap();
        bytes.extend(w.into_inner());

        let err = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode_pdos_header()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ShapeMismatch {
                what: "species labels",
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn huge_counts_without_weights_are_eof() {
        let order = ByteOrder::Big;
        let mut bytes = header_with_counts([i32::MAX, 2, 1, i32::MAX]);
        let mut w = RecordWriter::new(Vec::new(), order, MarkerWidth::Four);
        for _ in 0..3 {
            w.write_record(&order.write_i32(1)).unwrap();
        }
        bytes.extend(w.into_inner());

        let err = PdosDecoder::from_bytes(&bytes, &DecoderConfig::default())
            .unwrap()
            .decode()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedEof {
                record: "k-point position",
                kpoint: 0,
                ..
            }
        ));
    }

    #[test]
    fn load_from_path() {
        let h = header(1, 1, 2, 2);
        let bytes = full_file(&h, EncoderConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Si.pdos_bin");
        std::fs::write(&path, &bytes).unwrap();

        let w = load_pdos(&path).unwrap();
        assert_eq!(w.as_flat(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            load_pdos(dir.path().join("missing.pdos_bin")),
            Err(DecodeError::Io(_))
        ));
    }
}
