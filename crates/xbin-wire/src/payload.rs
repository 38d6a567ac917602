use crate::byte_order::ByteOrder;
use crate::error::WireError;

/// A double-precision complex number as Fortran stores `COMPLEX(kind=dp)`:
/// real part first, then imaginary part, 16 bytes in total.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    #[must_use]
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Element widths in bytes.
pub const I32_WIDTH: usize = 4;
pub const F64_WIDTH: usize = 8;
pub const COMPLEX_WIDTH: usize = 16;

/// Sequential typed reader over one record payload.
///
/// Records frequently pack several values of different types (a k-point
/// record is an `i32` index followed by three `f64` coordinates), so the
/// reader keeps a cursor and hands out one field at a time. Call
/// [`finish`](Self::finish) after the last field to make sure nothing
/// was left behind.
///
/// ```text
///   payload: [ i32 | f64 | f64 | f64 ]
///   cursor:    ^ 0   ^ 4   ^ 12  ^ 20  ^ 28 (finish)
/// ```
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    cursor: usize,
    order: ByteOrder,
}

impl<'a> PayloadReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self {
            buf,
            cursor: 0,
            order,
        }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let available = self.remaining();
        if available < n {
            return Err(WireError::PayloadExhausted {
                offset: self.cursor,
                needed: n,
                available,
            });
        }
        let bytes = &self.buf[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(bytes)
    }

    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        let b = self.take(I32_WIDTH)?;
        Ok(self.order.read_i32([b[0], b[1], b[2], b[3]]))
    }

    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        let b = self.take(F64_WIDTH)?;
        Ok(self
            .order
            .read_f64([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if fewer than 16 bytes remain.
    pub fn read_complex(&mut self) -> Result<Complex64, WireError> {
        let re = self.read_f64()?;
        let im = self.read_f64()?;
        Ok(Complex64 { re, im })
    }

    /// Read `n` consecutive `i32` values.
    ///
    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if the payload is too short.
    pub fn read_i32s(&mut self, n: usize) -> Result<Vec<i32>, WireError> {
        (0..n).map(|_| self.read_i32()).collect()
    }

    /// Read `n` consecutive `f64` values.
    ///
    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if the payload is too short.
    pub fn read_f64s(&mut self, n: usize) -> Result<Vec<f64>, WireError> {
        (0..n).map(|_| self.read_f64()).collect()
    }

    /// Read a `CHARACTER(len=width)` field.
    ///
    /// Fortran pads strings with blanks; list-directed writers sometimes
    /// wrap them in quotes. Both are stripped, as are NUL bytes. Bytes
    /// that are not UTF-8 are replaced rather than rejected since these
    /// strings are only ever labels.
    ///
    /// # Errors
    ///
    /// [`WireError::PayloadExhausted`] if fewer than `width` bytes remain.
    pub fn read_fixed_str(&mut self, width: usize) -> Result<String, WireError> {
        let bytes = self.take(width)?;
        Ok(clean_fortran_str(bytes))
    }

    /// Assert that the whole payload has been consumed.
    ///
    /// # Errors
    ///
    /// [`WireError::TrailingPayload`] if bytes remain.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            extra_bytes => Err(WireError::TrailingPayload { extra_bytes }),
        }
    }
}

/// Strip Fortran padding from a raw string field.
#[must_use]
pub fn clean_fortran_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .trim_matches('\'')
        .trim()
        .to_string()
}

fn check_alignment(payload: &[u8], width: usize) -> Result<usize, WireError> {
    if payload.len() % width != 0 {
        return Err(WireError::MisalignedPayload {
            len: payload.len(),
            width,
        });
    }
    Ok(payload.len() / width)
}

/// Reinterpret a whole payload as `i32` values.
///
/// # Errors
///
/// [`WireError::MisalignedPayload`] if the length is not a multiple of 4.
pub fn decode_i32s(payload: &[u8], order: ByteOrder) -> Result<Vec<i32>, WireError> {
    let n = check_alignment(payload, I32_WIDTH)?;
    PayloadReader::new(payload, order).read_i32s(n)
}

/// Reinterpret a whole payload as IEEE-754 doubles.
///
/// # Errors
///
/// [`WireError::MisalignedPayload`] if the length is not a multiple of 8.
pub fn decode_f64s(payload: &[u8], order: ByteOrder) -> Result<Vec<f64>, WireError> {
    let n = check_alignment(payload, F64_WIDTH)?;
    PayloadReader::new(payload, order).read_f64s(n)
}

/// Reinterpret a whole payload as complex doubles.
///
/// # Errors
///
/// [`WireError::MisalignedPayload`] if the length is not a multiple of 16.
pub fn decode_complex(payload: &[u8], order: ByteOrder) -> Result<Vec<Complex64>, WireError> {
    let n = check_alignment(payload, COMPLEX_WIDTH)?;
    let mut reader = PayloadReader::new(payload, order);
    (0..n).map(|_| reader.read_complex()).collect()
}

/// Counterpart of the decode functions, used by writers and tests.
#[derive(Debug)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl PayloadBuilder {
    #[must_use]
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&self.order.write_i32(value));
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.buf.extend_from_slice(&self.order.write_f64(value));
        self
    }

    pub fn complex(&mut self, value: Complex64) -> &mut Self {
        self.f64(value.re).f64(value.im)
    }

    pub fn i32s(&mut self, values: &[i32]) -> &mut Self {
        for &v in values {
            self.i32(v);
        }
        self
    }

    pub fn f64s(&mut self, values: &[f64]) -> &mut Self {
        for &v in values {
            self.f64(v);
        }
        self
    }

    /// Blank-pad (or cut) `value` to exactly `width` bytes.
    pub fn fixed_str(&mut self, value: &str, width: usize) -> &mut Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(width, b' ');
        self.buf.extend_from_slice(&bytes);
        self
    }

    #[must_use]
    pub fn build(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
