use std::f64::consts::{PI, TAU};

use log::trace;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

use crate::kinematics::{checked, InvalidCoordinate, Position};

/// Cells whose azimuths spread more than this are assumed to wrap around ±π
const PHI_WRAP_SPREAD: f64 = 4.;

/// A calorimeter cell belonging to a cluster
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct CaloCell {
    energy: N64,
    position: Position,
}

impl CaloCell {
    /// A new cell with `energy` in GeV
    pub fn new(energy: f64, eta: f64, phi: f64) -> Result<Self, InvalidCoordinate> {
        Ok(Self {
            energy: checked("energy", energy)?,
            position: Position::new(eta, phi)?,
        })
    }

    pub fn energy(&self) -> N64 {
        self.energy
    }

    pub fn position(&self) -> &Position {
        &self.position
    }
}

/// Cluster kinematics reconstructed directly from its cells
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawCluster {
    /// Transverse energy in GeV
    pub et: N64,
    pub position: Position,
}

/// Reconstruct the raw cluster from its `cells`
///
/// η and φ are energy-weighted averages over the cells. If the cells
/// straddle the φ = ±π boundary, negative azimuths are shifted by 2π
/// before averaging. Returns `None` if the total energy is not positive.
pub fn raw_cluster(cells: &[CaloCell]) -> Option<RawCluster> {
    let (phi_lo, phi_hi) = cells.iter().fold((PI, -PI), |(lo, hi), c| {
        let phi = c.position.phi().raw();
        (lo.min(phi), hi.max(phi))
    });
    let wraps = phi_hi - phi_lo > PHI_WRAP_SPREAD;

    let mut energy = 0.;
    let mut weighted_eta = 0.;
    let mut weighted_phi = 0.;
    for cell in cells {
        let e = cell.energy.raw();
        let mut phi = cell.position.phi().raw();
        if wraps && phi < 0. {
            phi += TAU;
        }
        energy += e;
        weighted_eta += e * cell.position.eta().raw();
        weighted_phi += e * phi;
    }
    if energy <= 0. {
        trace!("No raw cluster: total cell energy {energy}");
        return None;
    }
    let eta = weighted_eta / energy;
    let mut phi = weighted_phi / energy;
    if wraps && phi > PI {
        phi -= TAU;
    }
    let et = energy / eta.cosh();
    Some(RawCluster {
        et: n64(et),
        position: Position::new(eta, phi).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_eq::assert_float_eq;

    #[test]
    fn weighted_average() {
        let cells = [
            CaloCell::new(30., 0.1, 1.0).unwrap(),
            CaloCell::new(10., 0.3, 1.4).unwrap(),
        ];
        let cluster = raw_cluster(&cells).unwrap();
        assert_float_eq!(cluster.position.eta().raw(), 0.15, abs <= 1e-12);
        assert_float_eq!(cluster.position.phi().raw(), 1.1, abs <= 1e-12);
        assert_float_eq!(cluster.et.raw(), 40. / 0.15f64.cosh(), abs <= 1e-9);
    }

    #[test]
    fn wraps_around_pi() {
        let cells = [
            CaloCell::new(10., 0., 3.1).unwrap(),
            CaloCell::new(10., 0., -3.1).unwrap(),
        ];
        let cluster = raw_cluster(&cells).unwrap();
        let phi = cluster.position.phi().raw();
        assert_float_eq!(phi.abs(), PI, abs <= 1e-9);
    }

    #[test]
    fn wraps_to_negative() {
        let cells = [
            CaloCell::new(10., 0., 3.1).unwrap(),
            CaloCell::new(30., 0., -3.1).unwrap(),
        ];
        let cluster = raw_cluster(&cells).unwrap();
        let expected = (10. * 3.1 + 30. * (TAU - 3.1)) / 40. - TAU;
        assert_float_eq!(cluster.position.phi().raw(), expected, abs <= 1e-9);
        assert!(cluster.position.phi() < 0.);
    }

    #[test]
    fn no_energy() {
        assert_eq!(raw_cluster(&[]), None);
        let cells = [CaloCell::new(-1., 0., 0.).unwrap()];
        assert_eq!(raw_cluster(&cells), None);
    }
}
