#![warn(clippy::pedantic)]

pub mod castep_bin;
pub mod config;
pub mod error;
pub mod pdos;

pub use castep_bin::{CastepBinDecoder, load_castep_bin};
pub use config::DecoderConfig;
pub use error::DecodeError;
pub use pdos::{PdosDecoder, load_pdos, load_pdos_with};
