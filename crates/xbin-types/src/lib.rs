#![warn(clippy::pedantic)]

pub mod castep_bin;
pub mod error;
pub mod orbital;
pub mod pdos;
pub mod projection;

pub use castep_bin::{CastepBinData, ForceConstants, GroundState, Section};
pub use error::TypeError;
pub use orbital::{AngularMomentum, Orbital, Spin};
pub use pdos::{PdosHeader, PdosWeights};
pub use projection::{SiteProjection, SpinResolved, group_by_site};
