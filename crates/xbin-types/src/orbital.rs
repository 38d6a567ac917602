use std::fmt;

use crate::error::TypeError;

/// Spin channel. Files with one spin channel only ever use `Up`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Spin {
    Up,
    Down,
}

impl Spin {
    /// Spin for a zero-based channel index as stored in the file.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            _ => None,
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
        }
    }
}

/// Angular momentum channel `l` of a projected orbital.
///
/// ```text
/// ┌───┬──────┬────────────┐
/// │ l │ Name │ Orbitals   │
/// ├───┼──────┼────────────┤
/// │ 0 │ s    │ 1          │
/// │ 1 │ p    │ 3          │
/// │ 2 │ d    │ 5          │
/// │ 3 │ f    │ 7          │
/// └───┴──────┴────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AngularMomentum {
    S,
    P,
    D,
    F,
}

impl AngularMomentum {
    #[must_use]
    pub fn l(self) -> i32 {
        match self {
            Self::S => 0,
            Self::P => 1,
            Self::D => 2,
            Self::F => 3,
        }
    }

    /// Number of magnetic sub-orbitals, `2l + 1`.
    #[must_use]
    pub fn degeneracy(self) -> usize {
        self.orbitals().len()
    }

    /// The sub-orbitals of this channel, in the order CASTEP writes them.
    #[must_use]
    pub fn orbitals(self) -> &'static [Orbital] {
        match self {
            Self::S => &[Orbital::S],
            Self::P => &[Orbital::Px, Orbital::Py, Orbital::Pz],
            Self::D => &[
                Orbital::Dz2,
                Orbital::Dyz,
                Orbital::Dxz,
                Orbital::Dx2y2,
                Orbital::Dxy,
            ],
            Self::F => &[
                Orbital::Fxxx,
                Orbital::Fyyy,
                Orbital::Fzzz,
                Orbital::Fxyz,
                Orbital::FzXxYy,
                Orbital::FyZzXx,
                Orbital::FxYyZz,
            ],
        }
    }
}

impl TryFrom<i32> for AngularMomentum {
    type Error = TypeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::S),
            1 => Ok(Self::P),
            2 => Ok(Self::D),
            3 => Ok(Self::F),
            _ => Err(TypeError::InvalidAngularMomentum { value }),
        }
    }
}

impl fmt::Display for AngularMomentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S => "s",
            Self::P => "p",
            Self::D => "d",
            Self::F => "f",
        };
        f.write_str(name)
    }
}

/// A real-harmonic orbital, named as CASTEP labels it in `.castep` output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Orbital {
    S,
    Px,
    Py,
    Pz,
    Dz2,
    Dyz,
    Dxz,
    Dx2y2,
    Dxy,
    Fxxx,
    Fyyy,
    Fzzz,
    Fxyz,
    FzXxYy,
    FyZzXx,
    FxYyZz,
}

impl Orbital {
    /// CASTEP's label for the orbital.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::Px => "Px",
            Self::Py => "Py",
            Self::Pz => "Pz",
            Self::Dz2 => "Dzz",
            Self::Dyz => "Dzy",
            Self::Dxz => "Dzx",
            Self::Dx2y2 => "Dxx-yy",
            Self::Dxy => "Dxy",
            Self::Fxxx => "Fxxx",
            Self::Fyyy => "Fyyy",
            Self::Fzzz => "Fzzz",
            Self::Fxyz => "Fxyz",
            Self::FzXxYy => "Fz(xx-yy)",
            Self::FyZzXx => "Fy(zz-xx)",
            Self::FxYyZz => "Fx(yy-zz)",
        }
    }

    #[must_use]
    pub fn angular_momentum(self) -> AngularMomentum {
        match self {
            Self::S => AngularMomentum::S,
            Self::Px | Self::Py | Self::Pz => AngularMomentum::P,
            Self::Dz2 | Self::Dyz | Self::Dxz | Self::Dx2y2 | Self::Dxy => AngularMomentum::D,
            _ => AngularMomentum::F,
        }
    }
}

impl fmt::Display for Orbital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degeneracy_is_two_l_plus_one() {
        for l in 0..=3 {
            let am = AngularMomentum::try_from(l).unwrap();
            assert_eq!(am.l(), l);
            assert_eq!(am.degeneracy(), usize::try_from(2 * l + 1).unwrap());
        }
    }

    #[test]
    fn orbitals_belong_to_their_channel() {
        for l in 0..=3 {
            let am = AngularMomentum::try_from(l).unwrap();
            for orbital in am.orbitals() {
                assert_eq!(orbital.angular_momentum(), am);
            }
        }
    }

    #[test]
    fn reject_g_orbitals() {
        assert!(matches!(
            AngularMomentum::try_from(4),
            Err(TypeError::InvalidAngularMomentum { value: 4 })
        ));
        assert!(AngularMomentum::try_from(-1).is_err());
    }

    #[test]
    fn castep_labels() {
        assert_eq!(Orbital::Dx2y2.to_string(), "Dxx-yy");
        assert_eq!(Orbital::FyZzXx.label(), "Fy(zz-xx)");
        assert_eq!(AngularMomentum::D.to_string(), "d");
    }

    #[test]
    fn spin_indices() {
        assert_eq!(Spin::from_index(0), Some(Spin::Up));
        assert_eq!(Spin::from_index(1).map(Spin::index), Some(1));
        assert_eq!(Spin::from_index(2), None);
    }
}
