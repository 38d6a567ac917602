/// Errors raised when assembling or regrouping decoded data.
///
/// These sit above the wire layer: the bytes were framed and read fine,
/// but what they describe does not hang together.
///
/// ```text
/// ┌──────────────────────────┬───────────────────────────────────────────┐
/// │ Variant                  │ Cause                                     │
/// ├──────────────────────────┼───────────────────────────────────────────┤
/// │ InvalidAngularMomentum   │ l channel outside s/p/d/f                 │
/// │ InvalidSpinCount         │ neither 1 nor 2 spin channels             │
/// │ ShapeMismatch            │ array length disagrees with declared dims │
/// └──────────────────────────┴───────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("angular momentum channel {value} is not one of s, p, d, f")]
    InvalidAngularMomentum { value: i32 },

    #[error("{value} spin channels, expected 1 or 2")]
    InvalidSpinCount { value: usize },

    #[error("{what}: expected {expected} elements, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}
