use std::f64::consts::{PI, TAU};

use log::{debug, warn};
use ndhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::histogram::{hist2d, Hist2D, EM_ETA, EM_PHI};
use crate::kinematics::Position;

/// Map of trigger towers flagged as dead or bad
///
/// Uses the binning of the EM efficiency maps, so that a flagged bin
/// removes exactly one bin from the "no dead/bad tower" efficiencies.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(from = "Vec<Position>", into = "Vec<Position>")]
pub struct DeadTowerMap {
    flagged: Hist2D,
    towers: Vec<Position>,
}

impl Default for DeadTowerMap {
    fn default() -> Self {
        Self {
            flagged: hist2d(EM_ETA, EM_PHI),
            towers: Vec::new(),
        }
    }
}

impl DeadTowerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the tower containing `position`
    pub fn flag(&mut self, position: Position) {
        let (eta, phi) = coordinates(&position);
        if eta < EM_ETA.low() || eta >= EM_ETA.high() {
            warn!("Ignoring dead tower outside the EM acceptance at η = {eta}");
            return;
        }
        debug!("Flagging tower at (η, φ) = ({eta}, {phi})");
        self.flagged.fill(&(eta, phi));
        self.towers.push(position);
    }

    /// Whether `position` lies in a flagged tower
    pub fn is_flagged(&self, position: &Position) -> bool {
        self.flagged
            .value(&coordinates(position))
            .is_some_and(|&n| n > 0.)
    }

    pub fn towers(&self) -> &[Position] {
        &self.towers
    }

    pub fn is_empty(&self) -> bool {
        self.towers.is_empty()
    }
}

fn coordinates(position: &Position) -> (f64, f64) {
    let phi = position.phi().raw();
    // φ = π belongs to the first bin, like φ = -π
    let phi = if phi >= PI { phi - TAU } else { phi };
    (position.eta().raw(), phi)
}

impl From<Vec<Position>> for DeadTowerMap {
    fn from(towers: Vec<Position>) -> Self {
        let mut map = Self::new();
        for tower in towers {
            map.flag(tower);
        }
        map
    }
}

impl From<DeadTowerMap> for Vec<Position> {
    fn from(map: DeadTowerMap) -> Self {
        map.towers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(eta: f64, phi: f64) -> Position {
        Position::new(eta, phi).unwrap()
    }

    #[test]
    fn lookup() {
        let mut map = DeadTowerMap::new();
        map.flag(pos(0.05, 0.05));
        assert!(map.is_flagged(&pos(0.01, 0.01)));
        assert!(!map.is_flagged(&pos(0.15, 0.01)));
        assert!(!map.is_flagged(&pos(-0.05, 0.01)));
    }

    #[test]
    fn l1calo_phi() {
        let mut map = DeadTowerMap::new();
        map.flag(pos(1.0, -3.1));
        // -3.1 + 2π, as used by the trigger
        assert!(map.is_flagged(&pos(1.0, TAU - 3.1)));
        assert!(!map.is_flagged(&pos(1.0, 3.1)));
    }

    #[test]
    fn outside_acceptance() {
        let mut map = DeadTowerMap::new();
        map.flag(pos(3.0, 0.));
        assert!(map.is_empty());
        assert!(!map.is_flagged(&pos(3.0, 0.)));
    }

    #[test]
    fn acceptance_edges() {
        let mut map = DeadTowerMap::new();
        map.flag(pos(2.5, 0.));
        assert!(map.is_empty());
        assert!(!map.is_flagged(&pos(3.0, 0.)));

        map.flag(pos(-2.5, 0.));
        assert!(map.is_flagged(&pos(-2.45, 0.05)));

        map.flag(pos(1.0, PI));
        assert!(map.is_flagged(&pos(1.0, -PI)));
        assert!(map.is_flagged(&pos(1.0, PI)));
        assert!(!map.is_flagged(&pos(1.0, 4.0)));
        assert!(!map.is_flagged(&pos(1.0, 1.5)));
    }

    #[test]
    fn yaml() {
        let map: DeadTowerMap =
            serde_yaml::from_str("[{eta: 0.05, phi: 0.05}, {eta: -1.95, phi: 1.0}]")
                .unwrap();
        assert_eq!(map.towers().len(), 2);
        assert!(map.is_flagged(&pos(-1.99, 1.01)));
    }
}
