#![warn(clippy::pedantic)]

pub mod castep_bin;
pub mod config;
pub mod error;
pub mod pdos;

pub use castep_bin::CastepBinEncoder;
pub use config::EncoderConfig;
pub use error::EncodeError;
pub use pdos::PdosEncoder;
