use std::collections::BTreeMap;

use ndarray::{Array2, s};

use crate::error::TypeError;
use crate::orbital::{AngularMomentum, Orbital};
use crate::pdos::PdosWeights;

/// Weights of one orbital on one site, shape `(num_kpoints, max_bands)`
/// per spin channel.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinResolved {
    pub up: Array2<f64>,
    /// Present only for spin-polarised files.
    pub down: Option<Array2<f64>>,
}

impl SpinResolved {
    fn accumulate(&mut self, other: &SpinResolved) {
        self.up += &other.up;
        if let (Some(mine), Some(theirs)) = (self.down.as_mut(), other.down.as_ref()) {
            *mine += theirs;
        }
    }
}

/// The projected weights of a single atom, keyed by orbital.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteProjection {
    /// Species index as written in the file (1-based).
    pub species: i32,
    /// Ion index within the species (1-based).
    pub ion: i32,
    pub orbitals: BTreeMap<Orbital, SpinResolved>,
}

/// Regroup the flat orbital axis of `weights` by atom and orbital.
///
/// Sites come out ordered by species, then by ion within the species.
/// Within a site, the orbitals of each `l` channel are labelled in the
/// order CASTEP writes them. A channel that appears more than once on
/// the same atom (two p shells, say) is folded onto the same labels by
/// summing, so a site always has at most one entry per orbital.
///
/// ```text
///   orbital axis:  [Si1 s][Si1 px py pz][Si2 s][Si2 px py pz] ...
///                     │         │
///                     ▼         ▼
///   site 0 (Si 1): { S: .., Px: .., Py: .., Pz: .. }
///   site 1 (Si 2): { S: .., Px: .., Py: .., Pz: .. }
/// ```
///
/// # Errors
///
/// [`TypeError::InvalidAngularMomentum`] if any orbital's `l` is not
/// one of s, p, d, f.
pub fn group_by_site(weights: &PdosWeights) -> Result<Vec<SiteProjection>, TypeError> {
    let header = weights.header();
    let channels = header
        .angular_momentum
        .iter()
        .map(|&l| AngularMomentum::try_from(l))
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_site: BTreeMap<(i32, i32), Vec<usize>> = BTreeMap::new();
    for i in 0..header.num_orbitals {
        by_site
            .entry((header.species[i], header.ion[i]))
            .or_default()
            .push(i);
    }

    let mut sites = Vec::with_capacity(by_site.len());
    let mut previous: Option<(i32, i32)> = None;
    for ((sp, ion), on_site) in by_site {
        let expected = match previous {
            Some((prev_sp, prev_ion)) if prev_sp == sp => prev_ion.saturating_add(1),
            _ => 1,
        };
        if ion > expected {
            tracing::warn!(species = sp, from = expected, to = ion - 1, "no projected orbitals for ions");
        }
        previous = Some((sp, ion));

        let mut orbitals: BTreeMap<Orbital, SpinResolved> = BTreeMap::new();
        for am in [
            AngularMomentum::S,
            AngularMomentum::P,
            AngularMomentum::D,
            AngularMomentum::F,
        ] {
            let labels = am.orbitals();
            let in_channel = on_site.iter().filter(|&&i| channels[i] == am);
            for (n, &orbital_index) in in_channel.enumerate() {
                let orbital = labels[n % labels.len()];
                let resolved = extract(weights, orbital_index);
                match orbitals.get_mut(&orbital) {
                    Some(existing) => existing.accumulate(&resolved),
                    None => {
                        orbitals.insert(orbital, resolved);
                    }
                }
            }
        }

        sites.push(SiteProjection {
            species: sp,
            ion,
            orbitals,
        });
    }

    Ok(sites)
}

fn extract(weights: &PdosWeights, orbital_index: usize) -> SpinResolved {
    let w = weights.weights();
    let up = w.slice(s![.., 0, .., orbital_index]).to_owned();
    let down = (weights.num_spins() == 2).then(|| w.slice(s![.., 1, .., orbital_index]).to_owned());
    SpinResolved { up, down }
}
