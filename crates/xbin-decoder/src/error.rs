use xbin_types::TypeError;
use xbin_wire::WireError;

/// Errors that can occur while decoding a `pdos_bin` or `castep_bin` file.
///
/// Framing problems surface as [`DecodeError::Wire`]; everything that
/// needs knowledge of the file's schema gets its own variant.
///
/// Error hierarchy:
///
/// ```text
///   DecodeError
///   ├── UnsupportedByteOrder   ← auto-detection found no consistent order
///   ├── UnexpectedEof          ← weights ran out before the header's shape
///   ├── InvalidDimension       ← negative or out-of-range count
///   ├── ShapeMismatch          ← record length disagrees with its shape
///   ├── ShapeTooLarge          ← declared shape overflows a usize
///   ├── NotCastepBin           ← first record is not the CASTEP_BIN magic
///   ├── MissingSection         ← requested section absent from the file
///   ├── MissingDimension       ← section needs a dimension nobody wrote
///   ├── Type(TypeError)        ← from xbin-types result assembly
///   ├── Wire(WireError)        ← from xbin-wire record framing
///   └── Io(std::io::Error)     ← from opening or reading the file
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Neither byte order frames the first record consistently, or the
    /// configured order name was not recognised.
    #[error("unsupported byte order: {reason}")]
    UnsupportedByteOrder { reason: String },

    /// The stream ended while reading the k-point blocks.
    ///
    /// `record` names what was being read; the indices are 0-based and
    /// say how far the decoder got.
    #[error(
        "file ended at offset {offset} while reading {record} (k-point {kpoint}, spin {spin}, band {band})"
    )]
    UnexpectedEof {
        record: &'static str,
        kpoint: usize,
        spin: usize,
        band: usize,
        offset: u64,
    },

    /// A count in the file is negative or out of range.
    #[error("invalid {what}: {value}")]
    InvalidDimension { what: &'static str, value: i64 },

    /// A record holds a different number of elements than its shape implies.
    #[error("{what} at offset {offset}: expected {expected} elements, found {found}")]
    ShapeMismatch {
        what: &'static str,
        offset: u64,
        expected: usize,
        found: usize,
    },

    /// The dimensions read from the file multiply out past what can be
    /// addressed.
    #[error("{what}: declared shape is too large")]
    ShapeTooLarge { what: &'static str },

    /// The first record is not the `CASTEP_BIN` magic string.
    #[error("not a castep_bin file (first record is {found:?})")]
    NotCastepBin { found: String },

    /// A section was requested but the file has no such tag.
    #[error("section {tag} not found in file")]
    MissingSection { tag: &'static str },

    /// A section's shape depends on a dimension that was never decoded.
    #[error("section {section} needs {dimension}, which is not in the file")]
    MissingDimension {
        section: &'static str,
        dimension: &'static str,
    },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
