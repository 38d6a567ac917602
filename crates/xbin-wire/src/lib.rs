#![warn(clippy::pedantic)]

pub mod byte_order;
pub mod error;
pub mod payload;
pub mod record;

pub use byte_order::{ByteOrder, ByteOrderSetting, MarkerWidth};
pub use error::WireError;
pub use payload::{Complex64, PayloadBuilder, PayloadReader, decode_complex, decode_f64s, decode_i32s};
pub use record::{Record, RecordReader, RecordWriter, detect_byte_order};
