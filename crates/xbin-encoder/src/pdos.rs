use std::io::Write;

use xbin_types::pdos::TITLE_LEN;
use xbin_types::{PdosHeader, PdosWeights};
use xbin_wire::{PayloadBuilder, RecordWriter};

use crate::config::EncoderConfig;
use crate::error::EncodeError;

/// One k-point awaiting serialization.
///
/// `spins[s][b]` is the row of `num_orbitals` weights for band `b` of
/// spin channel `s`. A spin may list fewer bands than `max_bands`.
struct PendingKpoint {
    position: [f64; 3],
    spins: Vec<Vec<Vec<f64>>>,
}

/// Writes `pdos_bin` files.
///
/// The record sequence mirrors what CASTEP's spectral task produces:
///
/// ```text
/// ┌────────────────────────────────────────────────────────────┐
/// │ version (f64)                                              │
/// │ title (80 chars)                                           │
/// │ num_kpoints, num_spins, num_orbitals, max_bands (i32 each) │
/// │ species[], ion[], angular_momentum[] (i32 × num_orbitals)  │
/// ├────────────────────────────────────────────────────────────┤
/// │ for each k-point:                                          │
/// │   k-point index (i32) + position (f64 × 3)                 │
/// │   for each spin:                                           │
/// │     spin index (i32)                                       │
/// │     num_eigenvalues (i32)                                  │
/// │     num_eigenvalues × weights (f64 × num_orbitals)         │
/// └────────────────────────────────────────────────────────────┘
/// ```
///
/// Every item in the boxes is its own record.
///
/// # Usage
///
/// ```rust
/// use xbin_encoder::PdosEncoder;
/// use xbin_types::PdosHeader;
///
/// let header = PdosHeader {
///     version: 1.0,
///     title: "Si2".into(),
///     num_kpoints: 1,
///     num_spins: 1,
///     num_orbitals: 1,
///     max_bands: 2,
///     species: vec![1],
///     ion: vec![1],
///     angular_momentum: vec![0],
/// };
/// let bytes = PdosEncoder::new(header)
///     .add_kpoint([0.0, 0.0, 0.0], vec![vec![vec![0.25], vec![0.75]]])
///     .encode()
///     .unwrap();
/// assert!(!bytes.is_empty());
/// ```
pub struct PdosEncoder {
    header: PdosHeader,
    config: EncoderConfig,
    kpoints: Vec<PendingKpoint>,
}

impl PdosEncoder {
    #[must_use]
    pub fn new(header: PdosHeader) -> Self {
        Self {
            header,
            config: EncoderConfig::default(),
            kpoints: Vec::new(),
        }
    }

    /// Rebuild an encoder from a decoded result, honouring the per
    /// k-point band counts so the output matches the original file.
    #[must_use]
    pub fn from_weights(weights: &PdosWeights) -> Self {
        let mut encoder = Self::new(weights.header().clone());
        let w = weights.weights();
        for k in 0..weights.num_kpoints() {
            let p = weights.kpoint_positions().row(k);
            let spins = (0..weights.num_spins())
                .map(|s| {
                    let nb = weights.num_eigenvalues()[[k, s]];
                    (0..nb)
                        .map(|b| (0..weights.num_orbitals()).map(|o| w[[k, s, b, o]]).collect())
                        .collect()
                })
                .collect();
            encoder.add_kpoint([p[0], p[1], p[2]], spins);
        }
        encoder
    }

    pub fn with_config(&mut self, config: EncoderConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Append the next k-point. `spins[s][b]` holds the orbital weights
    /// of band `b` in spin channel `s`.
    pub fn add_kpoint(&mut self, position: [f64; 3], spins: Vec<Vec<Vec<f64>>>) -> &mut Self {
        self.kpoints.push(PendingKpoint { position, spins });
        self
    }

    /// Serialize into a fresh buffer.
    ///
    /// # Errors
    ///
    /// [`EncodeError::ShapeMismatch`] when the k-points added do not agree
    /// with the header.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize into any writer. Returns the number of bytes written.
    ///
    /// Shapes are validated before the first byte goes out, so a failed
    /// call never leaves a half-written file behind.
    ///
    /// # Errors
    ///
    /// [`EncodeError::ShapeMismatch`] for inconsistent input,
    /// [`EncodeError::CountOverflow`] for a count above `i32::MAX`, plus
    /// any I/O error from the writer.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<usize, EncodeError> {
        self.validate()?;

        let h = &self.header;
        let order = self.config.byte_order;
        let mut out = RecordWriter::new(writer, order, self.config.marker_width)
            .with_max_subrecord_len(self.config.max_subrecord_len);
        let mut p = PayloadBuilder::new(order);
        let mut written = 0;

        written += out.write_record(&p.f64(h.version).build())?;
        written += out.write_record(&p.fixed_str(&h.title, TITLE_LEN).build())?;
        for count in counts(h)? {
            written += out.write_record(&p.i32(count).build())?;
        }
        written += out.write_record(&p.i32s(&h.species).build())?;
        written += out.write_record(&p.i32s(&h.ion).build())?;
        written += out.write_record(&p.i32s(&h.angular_momentum).build())?;

        for (k, kpoint) in self.kpoints.iter().enumerate() {
            let index = to_i32("k-point index", k + 1)?;
            written += out.write_record(&p.i32(index).f64s(&kpoint.position).build())?;
            for (s, bands) in kpoint.spins.iter().enumerate() {
                written += out.write_record(&p.i32(to_i32("spin index", s + 1)?).build())?;
                written += out.write_record(&p.i32(to_i32("number of eigenvalues", bands.len())?).build())?;
                for row in bands {
                    written += out.write_record(&p.f64s(row).build())?;
                }
            }
        }

        out.flush()?;
        tracing::debug!(bytes = written, kpoints = self.kpoints.len(), "encoded pdos_bin");
        Ok(written)
    }

    fn validate(&self) -> Result<(), EncodeError> {
        let h = &self.header;
        counts(h)?;
        check("k-points", h.num_kpoints, self.kpoints.len())?;
        for labels in [&h.species, &h.ion, &h.angular_momentum] {
            check("orbital labels", h.num_orbitals, labels.len())?;
        }
        for kpoint in &self.kpoints {
            check("spin channels", h.num_spins, kpoint.spins.len())?;
            for bands in &kpoint.spins {
                if bands.len() > h.max_bands {
                    return Err(EncodeError::ShapeMismatch {
                        what: "bands (at most)",
                        expected: h.max_bands,
                        found: bands.len(),
                    });
                }
                for row in bands {
                    check("orbital weights", h.num_orbitals, row.len())?;
                }
            }
        }
        Ok(())
    }
}

/// The four count records, in the order they appear in the file.
fn counts(h: &PdosHeader) -> Result<[i32; 4], EncodeError> {
    Ok([
        to_i32("number of k-points", h.num_kpoints)?,
        to_i32("number of spins", h.num_spins)?,
        to_i32("number of orbitals", h.num_orbitals)?,
        to_i32("maximum number of bands", h.max_bands)?,
    ])
}

fn check(what: &'static str, expected: usize, found: usize) -> Result<(), EncodeError> {
    if expected == found {
        Ok(())
    } else {
        Err(EncodeError::ShapeMismatch {
            what,
            expected,
            found,
        })
    }
}

pub(crate) fn to_i32(what: &'static str, value: usize) -> Result<i32, EncodeError> {
    i32::try_from(value).map_err(|_| EncodeError::CountOverflow { what, value })
}

#[cfg(test)]
mod tests {
    use xbin_decoder::{DecoderConfig, PdosDecoder};
    use xbin_wire::{ByteOrder, MarkerWidth};

    use super::*;

    fn header() -> PdosHeader {
        PdosHeader {
            version: 2.0,
            title: "unit".to_string(),
            num_kpoints: 1,
            num_spins: 1,
            num_orbitals: 2,
            max_bands: 2,
            species: vec![1, 1],
            ion: vec![1, 1],
            angular_momentum: vec![0, 1],
        }
    }

    #[test]
    fn record_count_and_size() {
        let bytes = PdosEncoder::new(header())
            .add_kpoint([0.5, 0.0, 0.0], vec![vec![vec![0.1, 0.9], vec![0.4, 0.6]]])
            .encode()
            .unwrap();

        // header: 8 + 80 + 4*4 + 3*8 payload bytes in 9 records
        // k-point: 28 + 4 + 4 + 2*16 payload bytes in 5 records
        let payload = 8 + 80 + 16 + 24 + 28 + 4 + 4 + 32;
        assert_eq!(bytes.len(), payload + 14 * 8);
    }

    #[test]
    fn reject_missing_kpoint() {
        let result = PdosEncoder::new(header()).encode();
        assert!(matches!(
            result,
            Err(EncodeError::ShapeMismatch {
                what: "k-points",
                expected: 1,
                found: 0
            })
        ));
    }

    #[test]
    fn reject_short_weight_row() {
        let result = PdosEncoder::new(header())
            .add_kpoint([0.0; 3], vec![vec![vec![0.1]]])
            .encode();
        assert!(matches!(
            result,
            Err(EncodeError::ShapeMismatch {
                what: "orbital weights",
                ..
            })
        ));
    }

    #[test]
    fn reject_too_many_bands() {
        let result = PdosEncoder::new(header())
            .add_kpoint([0.0; 3], vec![vec![vec![0.0, 0.0]; 3]])
            .encode();
        assert!(matches!(result, Err(EncodeError::ShapeMismatch { found: 3, .. })));
    }

    #[test]
    fn reject_count_past_i32() {
        let mut h = header();
        h.max_bands = usize::try_from(i32::MAX).unwrap() + 1;
        let mut buf = Vec::new();
        let result = PdosEncoder::new(h).write_to(&mut buf);
        assert!(matches!(
            result,
            Err(EncodeError::CountOverflow {
                what: "maximum number of bands",
                ..
            })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn from_weights_reproduces_bytes() {
        let original = PdosEncoder::new(header())
            .with_config(
                EncoderConfig::default()
                    .with_byte_order(ByteOrder::Little)
                    .with_marker_width(MarkerWidth::Eight),
            )
            .add_kpoint([0.25, 0.25, 0.0], vec![vec![vec![0.3, 0.7]]])
            .encode()
            .unwrap();

        let config = DecoderConfig::default().with_marker_width(MarkerWidth::Eight);
        let decoded = PdosDecoder::from_bytes(&original, &config)
            .unwrap()
            .decode()
            .unwrap();

        let again = PdosEncoder::from_weights(&decoded)
            .with_config(
                EncoderConfig::default()
                    .with_byte_order(ByteOrder::Little)
                    .with_marker_width(MarkerWidth::Eight),
            )
            .encode()
            .unwrap();
        assert_eq!(again, original);
    }
}
