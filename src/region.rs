use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Upper |η| edge of the EM barrel
pub const EM_BARREL_MAX: f64 = 1.37;
/// Upper |η| edge of the barrel/endcap transition region
pub const EM_TRANSITION_MAX: f64 = 1.52;
/// |η| range covered by the EM trigger
pub const EM_ETA_MAX: f64 = 2.5;

/// Start of the jet matching transition band
///
/// Jets above this |η| may be matched to forward RoIs.
pub const JET_CENTRAL_MAX: f64 = 2.899;
/// Start of the FCAL region
pub const JET_FORWARD_MIN: f64 = 3.2;

/// Detector region of an electromagnetic object
#[derive(
    Deserialize,
    Serialize,
    Display,
    EnumString,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum EmRegion {
    Barrel,
    Transition,
    Endcap,
    Forward,
}

impl EmRegion {
    pub fn classify(eta: N64) -> Self {
        let abs_eta = eta.abs();
        if abs_eta <= EM_BARREL_MAX {
            Self::Barrel
        } else if abs_eta < EM_TRANSITION_MAX {
            Self::Transition
        } else if abs_eta < EM_ETA_MAX {
            Self::Endcap
        } else {
            Self::Forward
        }
    }
}

/// Detector region of a jet, as relevant for RoI matching
#[derive(
    Deserialize,
    Serialize,
    Display,
    EnumString,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum JetRegion {
    /// Tile and HEC, matched by ΔR
    Central,
    /// End of the HEC, matched by ΔR or Δφ depending on the RoI
    Transition,
    /// FCAL, matched by Δφ only
    Forward,
}

impl JetRegion {
    pub fn classify(eta: N64) -> Self {
        let abs_eta = eta.abs();
        if abs_eta < JET_CENTRAL_MAX {
            Self::Central
        } else if abs_eta < JET_FORWARD_MIN {
            Self::Transition
        } else {
            Self::Forward
        }
    }
}

/// Whether a jet RoI lies in the forward region
pub fn is_forward_roi(eta: N64) -> bool {
    eta.abs() >= JET_FORWARD_MIN
}

/// Whether an EM object is in the η range used for efficiencies
///
/// With `exclude_transition` the barrel/endcap crack is removed.
pub fn in_good_em_eta_range(eta: N64, exclude_transition: bool) -> bool {
    match EmRegion::classify(eta) {
        EmRegion::Forward => eta.abs() <= EM_ETA_MAX,
        EmRegion::Transition => !exclude_transition,
        EmRegion::Barrel | EmRegion::Endcap => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn em_regions() {
        assert_eq!(EmRegion::classify(n64(0.)), EmRegion::Barrel);
        assert_eq!(EmRegion::classify(n64(-1.37)), EmRegion::Barrel);
        assert_eq!(EmRegion::classify(n64(1.4)), EmRegion::Transition);
        assert_eq!(EmRegion::classify(n64(-1.52)), EmRegion::Endcap);
        assert_eq!(EmRegion::classify(n64(2.49)), EmRegion::Endcap);
        assert_eq!(EmRegion::classify(n64(2.5)), EmRegion::Forward);
    }

    #[test]
    fn good_em_range() {
        assert!(in_good_em_eta_range(n64(0.5), true));
        assert!(!in_good_em_eta_range(n64(1.4), true));
        assert!(in_good_em_eta_range(n64(1.4), false));
        // the edge itself is still accepted
        assert!(in_good_em_eta_range(n64(-2.5), true));
        assert!(!in_good_em_eta_range(n64(2.6), false));
    }

    #[test]
    fn jet_regions() {
        assert_eq!(JetRegion::classify(n64(2.8)), JetRegion::Central);
        assert_eq!(JetRegion::classify(n64(-2.899)), JetRegion::Transition);
        assert_eq!(JetRegion::classify(n64(3.1)), JetRegion::Transition);
        assert_eq!(JetRegion::classify(n64(-3.2)), JetRegion::Forward);
        assert!(is_forward_roi(n64(-3.5)));
        assert!(!is_forward_roi(n64(3.1)));
    }
}
