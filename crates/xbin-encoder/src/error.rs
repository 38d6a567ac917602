use xbin_wire::WireError;

/// Errors that can occur while writing a `pdos_bin` or `castep_bin` file.
///
/// Error hierarchy:
///
/// ```text
///   EncodeError
///   ├── ShapeMismatch      ← supplied data disagrees with the header
///   ├── CountOverflow      ← a count does not fit the file's i32 field
///   ├── Wire(WireError)    ← from xbin-wire record writing
///   └── Io(std::io::Error) ← from the destination writer
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Counts are stored as Fortran default integers.
    #[error("{what} is {value}, which does not fit in an i32")]
    CountOverflow { what: &'static str, value: usize },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
