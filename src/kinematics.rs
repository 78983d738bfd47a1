use std::f64::consts::{PI, TAU};

use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate that is not a finite number
#[derive(Debug, Copy, Clone, PartialEq, Error)]
#[error("Invalid {name} coordinate: {value}")]
pub struct InvalidCoordinate {
    pub name: &'static str,
    pub value: f64,
}

pub(crate) fn checked(
    name: &'static str,
    value: f64,
) -> Result<N64, InvalidCoordinate> {
    if value.is_finite() {
        Ok(n64(value))
    } else {
        Err(InvalidCoordinate { name, value })
    }
}

/// A position in (pseudorapidity, azimuth) space
#[derive(
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Clone,
    Copy,
    Default,
)]
#[serde(try_from = "UncheckedPosition")]
pub struct Position {
    eta: N64,
    phi: N64,
}

#[derive(Deserialize)]
struct UncheckedPosition {
    eta: f64,
    phi: f64,
}

impl TryFrom<UncheckedPosition> for Position {
    type Error = InvalidCoordinate;

    fn try_from(p: UncheckedPosition) -> Result<Self, Self::Error> {
        Self::new(p.eta, p.phi)
    }
}

impl Position {
    /// Construct a new position, rejecting NaN and infinite coordinates
    pub fn new(eta: f64, phi: f64) -> Result<Self, InvalidCoordinate> {
        Ok(Self {
            eta: checked("eta", eta)?,
            phi: checked("phi", phi)?,
        })
    }

    /// Pseudorapidity
    pub fn eta(&self) -> N64 {
        self.eta
    }

    /// Azimuthal angle in radians
    pub fn phi(&self) -> N64 {
        self.phi
    }

    /// Azimuthal angle in the L1Calo convention [0, 2π)
    pub fn l1calo_phi(&self) -> N64 {
        l1calo_phi(self.phi)
    }

    /// Angular differences (Δη, Δφ) to another position
    pub fn deltas(&self, other: &Position) -> (N64, N64) {
        (self.eta - other.eta, delta_phi(self.phi - other.phi))
    }

    /// ΔR to another position
    pub fn delta_r(&self, other: &Position) -> N64 {
        let (deta, dphi) = self.deltas(other);
        (deta * deta + dphi * dphi).sqrt()
    }
}

/// Wrap an azimuthal difference into (-π, π]
pub fn delta_phi(dphi: N64) -> N64 {
    if dphi > -PI && dphi <= PI {
        return dphi;
    }
    let wrapped = dphi.raw().rem_euclid(TAU);
    // rem_euclid gives [0, 2π); shift the upper half down
    if wrapped > PI {
        n64(wrapped - TAU)
    } else {
        n64(wrapped)
    }
}

/// Map an offline azimuth in [-π, π] into the L1Calo convention [0, 2π)
pub fn l1calo_phi(phi: N64) -> N64 {
    if phi < 0. {
        phi + TAU
    } else {
        phi
    }
}
