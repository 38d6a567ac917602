//! Sample file generator.
//!
//! Writes a small set of `pdos_bin` and `castep_bin` files covering the
//! layouts the decoders accept, for poking at with other tools or for
//! checking a decoder built elsewhere against this one.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_fixtures -p xbin-tests -- [OUTPUT_DIR]
//! ```
//!
//! `OUTPUT_DIR` defaults to `fixtures/` under this crate. Set `RUST_LOG`
//! to `debug` to see every file's dimensions as it is written.
//!
//! # Generated files
//!
//! | File                          | Contents                                 |
//! |-------------------------------|------------------------------------------|
//! | si2_big.pdos_bin              | Si2, 4 k-points, 1 spin, big-endian      |
//! | si2_little.pdos_bin           | same, little-endian                      |
//! | si2_spin_wide.pdos_bin        | Si2, 2 spins, 8-byte markers             |
//! | si2_split.pdos_bin            | Si2, records split into 32-byte pieces   |
//! | flat_2x1x4x3.pdos_bin         | 2 k-points, 1 spin, 4 bands, 3 orbitals  |
//! | si2_cell.castep_bin           | cell sections only                       |
//! | si2_full.castep_bin           | cell, k-points, forces, ground state     |

#![allow(clippy::pedantic)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use xbin_encoder::{CastepBinEncoder, EncoderConfig};
use xbin_tests::{flat_header, sample_pdos, silicon_cell, silicon_full, silicon_header};
use xbin_wire::{ByteOrder, MarkerWidth};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let si = silicon_header(4, 1, 8);
    write(&out_dir, "si2_big.pdos_bin", &sample_pdos(&si, EncoderConfig::default()))?;
    write(
        &out_dir,
        "si2_little.pdos_bin",
        &sample_pdos(&si, EncoderConfig::default().with_byte_order(ByteOrder::Little)),
    )?;
    write(
        &out_dir,
        "si2_spin_wide.pdos_bin",
        &sample_pdos(
            &silicon_header(4, 2, 8),
            EncoderConfig::default().with_marker_width(MarkerWidth::Eight),
        ),
    )?;
    write(
        &out_dir,
        "si2_split.pdos_bin",
        &sample_pdos(&si, EncoderConfig::default().with_max_subrecord_len(32)),
    )?;
    write(
        &out_dir,
        "flat_2x1x4x3.pdos_bin",
        &sample_pdos(&flat_header(2, 1, 3, 4), EncoderConfig::default()),
    )?;

    write(
        &out_dir,
        "si2_cell.castep_bin",
        &CastepBinEncoder::new().encode(&silicon_cell())?,
    )?;
    write(
        &out_dir,
        "si2_full.castep_bin",
        &CastepBinEncoder::new().encode(&silicon_full())?,
    )?;

    tracing::info!(dir = %out_dir.display(), "all fixtures written");
    Ok(())
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(file = name, bytes = bytes.len(), "wrote fixture");
    Ok(())
}
