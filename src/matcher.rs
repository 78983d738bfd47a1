use derive_builder::Builder;
use log::trace;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::{Candidate, PositionKind, Roi};
use crate::kinematics::Position;
use crate::region::{is_forward_roi, JetRegion};
use crate::traits::Match;

/// Upper limits on the distance between an offline object and an RoI
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
pub struct DeltaCuts {
    pub delta_r: f64,
    pub delta_eta: f64,
    pub delta_phi: f64,
}

impl DeltaCuts {
    /// Default cuts for electromagnetic objects
    pub const EM: DeltaCuts = DeltaCuts {
        delta_r: 0.15,
        delta_eta: 0.2,
        delta_phi: 0.2,
    };

    /// Default cuts for hadronic objects
    pub const HAD: DeltaCuts = DeltaCuts {
        delta_r: 0.2,
        delta_eta: 0.3,
        delta_phi: 0.3,
    };
}

/// Closest RoI to an offline object
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the closest RoI
    pub best: Option<usize>,
    /// ΔR to the closest RoI, infinite if there is none
    pub delta_r: N64,
    pub delta_eta: N64,
    pub delta_phi: N64,
    /// Threshold word of the closest RoI, zero if there is none
    pub roi_word: u32,
    /// Whether the closest RoI is in the forward region
    pub forward: bool,
    /// Whether the closest RoI passes the matching cuts
    pub matched: bool,
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            best: None,
            delta_r: n64(f64::INFINITY),
            delta_eta: n64(f64::INFINITY),
            delta_phi: n64(f64::INFINITY),
            roi_word: 0,
            forward: false,
            matched: false,
        }
    }
}

impl MatchResult {
    /// Threshold word of a successful match, zero otherwise
    pub fn matched_word(&self) -> u32 {
        if self.matched {
            self.roi_word
        } else {
            0
        }
    }
}

/// Find the RoI with the smallest ΔR to `target`
///
/// Only RoIs for which `accept` returns `true` are considered. Ties
/// are resolved in favour of the RoI that comes first.
pub fn closest<F>(target: &Position, rois: &[Roi], accept: F) -> MatchResult
where
    F: Fn(&Roi) -> bool,
{
    let mut res = MatchResult::default();
    for (idx, roi) in rois.iter().enumerate() {
        if !accept(roi) {
            continue;
        }
        let (deta, dphi) = target.deltas(roi.position());
        let dr = (deta * deta + dphi * dphi).sqrt();
        if dr < res.delta_r {
            res = MatchResult {
                best: Some(idx),
                delta_r: dr,
                delta_eta: deta,
                delta_phi: dphi,
                roi_word: roi.roi_word(),
                forward: is_forward_roi(roi.position().eta()),
                matched: false,
            };
        }
    }
    res
}

/// Whether `roi` passes any threshold in `mask`
///
/// Without a mask every RoI is accepted.
pub fn passes_mask(roi: &Roi, mask: Option<u32>) -> bool {
    mask.map_or(true, |mask| roi.roi_word() & mask != 0)
}

/// Matching of electrons and photons to EM/tau RoIs
#[derive(Builder, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EmMatcher {
    /// Require ΔR below the cut
    #[builder(default = "true")]
    use_delta_r: bool,
    /// Require |Δη| and |Δφ| below the cuts
    #[builder(default)]
    use_delta_eta_phi: bool,
    #[builder(default = "DeltaCuts::EM")]
    cuts: DeltaCuts,
    /// Only consider RoIs passing one of these thresholds
    #[builder(default)]
    #[serde(skip)]
    required_mask: Option<u32>,
    /// Position of the offline object used for matching
    #[builder(default)]
    position: PositionKind,
}

impl Default for EmMatcher {
    fn default() -> Self {
        Self {
            use_delta_r: true,
            use_delta_eta_phi: false,
            cuts: DeltaCuts::EM,
            required_mask: None,
            position: PositionKind::default(),
        }
    }
}

impl EmMatcher {
    /// Decide whether distances pass the configured cuts
    ///
    /// With both checks enabled both have to pass, with both disabled
    /// nothing matches.
    pub fn delta_match(&self, delta_r: N64, delta_eta: N64, delta_phi: N64) -> bool {
        let r_match = delta_r < self.cuts.delta_r;
        let eta_phi_match = delta_eta.abs() < self.cuts.delta_eta
            && delta_phi.abs() < self.cuts.delta_phi;
        match (self.use_delta_r, self.use_delta_eta_phi) {
            (true, true) => r_match && eta_phi_match,
            (true, false) => r_match,
            (false, true) => eta_phi_match,
            (false, false) => false,
        }
    }

    pub fn position(&self) -> PositionKind {
        self.position
    }

    pub fn set_required_mask(&mut self, mask: Option<u32>) {
        self.required_mask = mask;
    }
}

impl Match for EmMatcher {
    fn best_match(&self, candidate: &Candidate, rois: &[Roi]) -> MatchResult {
        let target = candidate.position_of(self.position);
        let mut res = closest(target, rois, |roi| passes_mask(roi, self.required_mask));
        if res.best.is_some() {
            res.matched = self.delta_match(res.delta_r, res.delta_eta, res.delta_phi);
        }
        trace!("EM match: {res:?}");
        res
    }
}

/// Matching of jets to jet RoIs
///
/// Central jets are matched by ΔR, jets in the FCAL by Δφ only. In the
/// transition band the rule depends on whether the closest RoI is a
/// forward RoI.
#[derive(Builder, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JetMatcher {
    #[builder(default = "DeltaCuts::HAD")]
    cuts: DeltaCuts,
}

impl Default for JetMatcher {
    fn default() -> Self {
        Self {
            cuts: DeltaCuts::HAD,
        }
    }
}

impl JetMatcher {
    pub fn new(cuts: DeltaCuts) -> Self {
        Self { cuts }
    }

    /// Decide whether distances pass the region-dependent cuts
    pub fn delta_match(
        &self,
        region: JetRegion,
        delta_r: N64,
        delta_phi: N64,
        forward_roi: bool,
    ) -> bool {
        let r_match = delta_r < self.cuts.delta_r;
        let phi_match = delta_phi.abs() < self.cuts.delta_phi;
        match region {
            JetRegion::Central => r_match,
            JetRegion::Transition => {
                (r_match && !forward_roi) || (phi_match && forward_roi)
            }
            JetRegion::Forward => phi_match,
        }
    }
}

impl Match for JetMatcher {
    fn best_match(&self, candidate: &Candidate, rois: &[Roi]) -> MatchResult {
        let mut res = closest(candidate.position(), rois, |_| true);
        if res.best.is_some() {
            res.matched = self.delta_match(
                candidate.jet_region(),
                res.delta_r,
                res.delta_phi,
                res.forward,
            );
        }
        trace!("jet match: {res:?}");
        res
    }
}

/// Whether `target` is isolated from the leading RoI
///
/// The leading RoI is the one with the highest energy among the RoIs
/// passing `mask`. Without such an RoI, `target` counts as isolated.
pub fn is_isolated(
    target: &Position,
    rois: &[Roi],
    mask: Option<u32>,
    min_delta_r: f64,
) -> bool {
    let mut leading: Option<&Roi> = None;
    for roi in rois.iter().filter(|roi| passes_mask(roi, mask)) {
        if leading.map_or(true, |l| roi.et() > l.et()) {
            leading = Some(roi);
        }
    }
    match leading {
        Some(roi) => target.delta_r(roi.position()) > min_delta_r,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_eq::assert_float_eq;

    use crate::event::ObjectKind;

    const EM10: u32 = 1 << 2;

    fn electron(eta: f64, phi: f64) -> Candidate {
        Candidate::new(ObjectKind::Electron, 25., eta, phi).unwrap()
    }

    fn jet(eta: f64, phi: f64) -> Candidate {
        Candidate::new(ObjectKind::Jet, 80., eta, phi).unwrap()
    }

    #[test]
    fn selects_closest() {
        let rois = [
            Roi::new(0.52, 1.01, 10., EM10).unwrap(),
            Roi::new(2.0, -1.0, 10., EM10).unwrap(),
        ];
        let res = EmMatcher::default().best_match(&electron(0.5, 1.0), &rois);
        assert_eq!(res.best, Some(0));
        assert_float_eq!(res.delta_r.raw(), 0.0005f64.sqrt(), abs <= 1e-9);
        assert!(res.matched);
        assert_eq!(res.roi_word & EM10, EM10);
        assert_eq!(res.matched_word(), EM10);
    }

    #[test]
    fn too_far() {
        let rois = [Roi::new(2.0, -1.0, 10., EM10).unwrap()];
        let res = EmMatcher::default().best_match(&electron(0.5, 1.0), &rois);
        assert_eq!(res.best, Some(0));
        assert!(!res.matched);
        assert!(res.delta_r > 2.);
        assert_eq!(res.matched_word(), 0);
    }

    #[test]
    fn no_rois() {
        let res = EmMatcher::default().best_match(&electron(0.5, 1.0), &[]);
        assert_eq!(res.best, None);
        assert!(!res.matched);
        assert!(res.delta_r.is_infinite());
    }

    #[test]
    fn first_wins_on_tie() {
        let rois = [
            Roi::new(0.6, 1.0, 10., 1).unwrap(),
            Roi::new(0.4, 1.0, 10., 2).unwrap(),
        ];
        let res = EmMatcher::default().best_match(&electron(0.5, 1.0), &rois);
        assert_eq!(res.best, Some(0));
        assert_eq!(res.roi_word, 1);
    }

    #[test]
    fn category_filter() {
        let rois = [
            Roi::new(0.5, 1.0, 10., 1 << 3).unwrap(),
            Roi::new(0.55, 1.0, 10., EM10).unwrap(),
        ];
        let matcher = EmMatcherBuilder::default()
            .required_mask(Some(EM10))
            .build()
            .unwrap();
        let res = matcher.best_match(&electron(0.5, 1.0), &rois);
        assert_eq!(res.best, Some(1));
        assert!(res.matched);
    }

    #[test]
    fn match_modes() {
        let (dr, deta, dphi) = (n64(0.1), n64(0.05), n64(-0.25));
        let both = EmMatcherBuilder::default()
            .use_delta_eta_phi(true)
            .build()
            .unwrap();
        assert!(!both.delta_match(dr, deta, dphi));
        let only_r = EmMatcher::default();
        assert!(only_r.delta_match(dr, deta, dphi));
        let only_eta_phi = EmMatcherBuilder::default()
            .use_delta_r(false)
            .use_delta_eta_phi(true)
            .build()
            .unwrap();
        assert!(!only_eta_phi.delta_match(dr, deta, dphi));
        assert!(only_eta_phi.delta_match(dr, deta, n64(0.1)));
        let none = EmMatcherBuilder::default()
            .use_delta_r(false)
            .build()
            .unwrap();
        assert!(!none.delta_match(n64(0.), n64(0.), n64(0.)));
    }

    #[test]
    fn match_position() {
        let raw = Position::new(1.0, 1.0).unwrap();
        let e = electron(0.5, 1.0).with_raw_cluster(n64(20.), raw);
        let rois = [
            Roi::new(0.5, 1.0, 10., EM10).unwrap(),
            Roi::new(1.0, 1.0, 10., EM10).unwrap(),
        ];
        let res = EmMatcher::default().best_match(&e, &rois);
        assert_eq!(res.best, Some(1));
        let offline = EmMatcherBuilder::default()
            .position(PositionKind::Offline)
            .build()
            .unwrap();
        assert_eq!(offline.best_match(&e, &rois).best, Some(0));
    }

    #[test]
    fn jet_regions() {
        let matcher = JetMatcher::default();
        // central: ΔR
        let rois = [Roi::new(1.1, 0.5, 40., 1).unwrap()];
        assert!(matcher.best_match(&jet(1.0, 0.5), &rois).matched);
        let rois = [Roi::new(1.3, 0.5, 40., 1).unwrap()];
        assert!(!matcher.best_match(&jet(1.0, 0.5), &rois).matched);

        // forward: Δφ only, large Δη is fine
        let rois = [Roi::new(4.1, 0.6, 40., 1 << 8).unwrap()];
        let res = matcher.best_match(&jet(3.5, 0.5), &rois);
        assert!(res.forward);
        assert!(res.matched);
        let rois = [Roi::new(3.6, 1.0, 40., 1 << 8).unwrap()];
        assert!(!matcher.best_match(&jet(3.5, 0.5), &rois).matched);

        // transition band
        let rois = [Roi::new(3.4, 0.7, 40., 1 << 8).unwrap()];
        let res = matcher.best_match(&jet(3.0, 0.5), &rois);
        assert!(res.forward);
        assert!(res.matched);
        let rois = [Roi::new(2.9, 0.5, 40., 1).unwrap()];
        assert!(matcher.best_match(&jet(3.0, 0.5), &rois).matched);
        let rois = [Roi::new(3.1, 0.7, 40., 1).unwrap()];
        assert!(!matcher.best_match(&jet(3.0, 0.5), &rois).matched);
    }

    #[test]
    fn large_negative_delta_phi() {
        let matcher = JetMatcher::default();
        let rois = [Roi::new(4.0, 2.0, 40., 1 << 8).unwrap()];
        assert!(!matcher.best_match(&jet(3.5, 0.5), &rois).matched);
    }

    #[test]
    fn isolation() {
        let target = Position::new(0., 0.).unwrap();
        let rois = [
            Roi::new(0.1, 0., 50., 1).unwrap(),
            Roi::new(2., 2., 20., 1).unwrap(),
        ];
        assert!(!is_isolated(&target, &rois, None, 0.2));
        let rois = [
            Roi::new(0.1, 0., 20., 1).unwrap(),
            Roi::new(2., 2., 50., 1).unwrap(),
        ];
        assert!(is_isolated(&target, &rois, None, 0.2));
        // only RoIs passing the mask can be leading
        let rois = [
            Roi::new(0.1, 0., 20., 1 << 1).unwrap(),
            Roi::new(2., 2., 50., 1).unwrap(),
        ];
        assert!(!is_isolated(&target, &rois, Some(1 << 1), 0.2));
        assert!(is_isolated(&target, &rois, Some(1 << 2), 0.2));
        assert!(is_isolated(&target, &[], None, 0.2));
    }
}
