/// Electron and photon efficiencies
pub mod em;
/// Jet efficiencies
pub mod jet;

use std::ops::AddAssign;

use itertools::zip_eq;
use ndhistogram::Histogram;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::efficiency::{Efficiency, Efficiency1D, Efficiency2D, EfficiencyError};
use crate::event::Event;
use crate::histogram::{
    hist1d, hist2d, merge_into, reset, Binning, BinningMismatch, Hist1D, Hist2D,
};
use crate::traits::Monitor;

/// State of an efficiency monitor
#[derive(
    Deserialize,
    Serialize,
    Display,
    EnumString,
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
)]
pub enum Lifecycle {
    /// Settings are known, no histograms are booked
    #[default]
    Configured,
    /// Histograms are booked but empty
    Initialized,
    /// At least one event was processed
    Accumulating,
    /// Efficiencies were computed and histograms reset
    Finalized,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("Cannot {operation} a monitor in state {state}")]
pub struct LifecycleError {
    pub operation: &'static str,
    pub state: Lifecycle,
}

impl Lifecycle {
    fn error(self, operation: &'static str) -> LifecycleError {
        LifecycleError {
            operation,
            state: self,
        }
    }

    pub(crate) fn initialize(&mut self) -> Result<(), LifecycleError> {
        if *self != Self::Configured {
            return Err(self.error("initialize"));
        }
        *self = Self::Initialized;
        Ok(())
    }

    pub(crate) fn fill(&mut self) -> Result<(), LifecycleError> {
        self.require_booked("fill")?;
        *self = Self::Accumulating;
        Ok(())
    }

    pub(crate) fn finalize(&mut self) -> Result<(), LifecycleError> {
        self.require_booked("finalize")?;
        *self = Self::Finalized;
        Ok(())
    }

    pub(crate) fn merge(&mut self, other: Self) -> Result<(), LifecycleError> {
        self.require_booked("merge")?;
        other.require_booked("merge from")?;
        if other == Self::Accumulating {
            *self = Self::Accumulating;
        }
        Ok(())
    }

    pub(crate) fn require_booked(
        self,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        if self == Self::Configured {
            Err(self.error(operation))
        } else {
            Ok(())
        }
    }
}

/// End of an accumulation interval
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
    Hash,
)]
pub enum Boundary {
    EventsBlock,
    LumiBlock,
    /// End of run, which also ends the current lumi block
    Run,
}

impl Boundary {
    /// Whether efficiencies are computed at this boundary
    ///
    /// This is the end of each run, or with `test_merge` the end of
    /// each lumi block.
    pub fn finalizes(self, test_merge: bool) -> bool {
        match self {
            Boundary::EventsBlock => false,
            Boundary::LumiBlock => test_merge,
            Boundary::Run => true,
        }
    }
}

/// Error in an efficiency monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor used out of order")]
    Lifecycle(#[from] LifecycleError),
    #[error("Failed to compute efficiencies")]
    Efficiency(#[from] EfficiencyError),
    #[error("Failed to merge histograms")]
    Merge(#[from] BinningMismatch),
}

/// Bookkeeping of offline objects of one kind
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// All objects in processed events
    pub seen: u64,
    /// Objects not biased by the trigger selection
    pub unbiased: u64,
    pub passing_cuts: u64,
    /// Objects matched to an RoI
    pub triggered: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.seen += rhs.seen;
        self.unbiased += rhs.unbiased;
        self.passing_cuts += rhs.passing_cuts;
        self.triggered += rhs.triggered;
    }
}

/// Transverse energy spectrum and η-φ maps above energy thresholds
#[derive(Clone, Debug)]
pub struct HistogramSet {
    pub et: Hist1D,
    pub eta_phi: Vec<Hist2D>,
}

impl HistogramSet {
    pub fn new(et: Binning, eta: Binning, phi: Binning, nmaps: usize) -> Self {
        Self {
            et: hist1d(et),
            eta_phi: vec![hist2d(eta, phi); nmaps],
        }
    }

    /// Fill the spectrum, and each map whose threshold is below `et`
    pub fn fill(&mut self, et: f64, eta: f64, phi: f64, et_thresholds: &[f64]) {
        self.et.fill(&et);
        fill_maps(&mut self.eta_phi, et, eta, phi, et_thresholds);
    }

    pub fn merge(&mut self, other: &Self) -> Result<(), BinningMismatch> {
        merge_into(&mut self.et, &other.et)?;
        for (map, other) in zip_eq(&mut self.eta_phi, &other.eta_phi) {
            merge_into(map, other)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        reset(&mut self.et);
        self.eta_phi.iter_mut().for_each(reset);
    }

    /// Efficiencies with `self` as numerator
    pub fn efficiency(
        &self,
        denominator: &HistogramSet,
    ) -> Result<SetEfficiency, EfficiencyError> {
        Ok(SetEfficiency {
            et: Efficiency::new(&self.et, &denominator.et)?,
            eta_phi: efficiencies(&self.eta_phi, &denominator.eta_phi)?,
        })
    }
}

/// Fill each map whose threshold is below `et`
pub(crate) fn fill_maps(
    maps: &mut [Hist2D],
    et: f64,
    eta: f64,
    phi: f64,
    et_thresholds: &[f64],
) {
    for (map, &threshold) in maps.iter_mut().zip(et_thresholds) {
        if et > threshold {
            map.fill(&(eta, phi));
        }
    }
}

pub(crate) fn merge_maps(
    maps: &mut [Hist2D],
    other: &[Hist2D],
) -> Result<(), BinningMismatch> {
    for (map, other) in zip_eq(maps, other) {
        merge_into(map, other)?;
    }
    Ok(())
}

pub(crate) fn efficiencies(
    numerators: &[Hist2D],
    denominators: &[Hist2D],
) -> Result<Vec<Efficiency2D>, EfficiencyError> {
    zip_eq(numerators, denominators)
        .map(|(n, d)| Efficiency::new(n, d))
        .collect()
}

/// Efficiencies of a spectrum and its η-φ maps
#[derive(Clone, Debug)]
pub struct SetEfficiency {
    pub et: Efficiency1D,
    pub eta_phi: Vec<Efficiency2D>,
}

/// Efficiencies for a single trigger threshold
#[derive(Clone, Debug)]
pub struct ThresholdEfficiency {
    /// Position of the threshold in the RoI word
    pub bit: usize,
    pub label: Option<String>,
    pub efficiency: SetEfficiency,
    /// η-φ efficiencies excluding dead and bad towers
    pub good_towers: Vec<Efficiency2D>,
}

/// Fill `monitor` from `events` in parallel
///
/// Each worker fills its own partial monitor. The partial monitors are
/// merged at the end, so no histogram is shared between threads.
pub fn fill_parallel<M>(monitor: &mut M, events: &[Event]) -> Result<(), M::Error>
where
    M: Monitor + Clone + Send + Sync,
    M::Error: Send,
{
    let empty = monitor.partial()?;
    let merged = events
        .par_iter()
        .try_fold(
            || empty.clone(),
            |mut partial, event| partial.fill(event).map(|_| partial),
        )
        .try_reduce(
            || empty.clone(),
            |mut lhs, rhs| lhs.merge(rhs).map(|_| lhs),
        )?;
    monitor.merge(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_eq::assert_float_eq;

    use crate::config::{from_reader, EmConfig};
    use crate::event::{Candidate, EventBuilder, EventId, ObjectKind, Quality, Roi, VertexKind};
    use crate::histogram::{EM_ETA, EM_PHI};
    use crate::monitor::em::EmEfficiencyMonitor;

    #[test]
    fn lifecycle() {
        let mut state = Lifecycle::default();
        assert_eq!(
            state.fill(),
            Err(LifecycleError {
                operation: "fill",
                state: Lifecycle::Configured
            })
        );
        assert!(state.finalize().is_err());
        state.initialize().unwrap();
        assert!(state.initialize().is_err());
        state.fill().unwrap();
        assert_eq!(state, Lifecycle::Accumulating);
        state.finalize().unwrap();
        assert_eq!(state, Lifecycle::Finalized);
        // a new interval starts
        state.fill().unwrap();
        assert_eq!(state, Lifecycle::Accumulating);

        let mut partial = Lifecycle::Initialized;
        partial.merge(state).unwrap();
        assert_eq!(partial, Lifecycle::Accumulating);
        assert!(partial.merge(Lifecycle::Configured).is_err());
    }

    #[test]
    fn boundaries() {
        assert!(Boundary::Run.finalizes(false));
        assert!(Boundary::Run.finalizes(true));
        assert!(!Boundary::LumiBlock.finalizes(false));
        assert!(Boundary::LumiBlock.finalizes(true));
        assert!(!Boundary::EventsBlock.finalizes(true));
    }

    #[test]
    fn histogram_set() {
        let et = Binning::new(10, 0., 100.);
        let mut all = HistogramSet::new(et, EM_ETA, EM_PHI, 3);
        all.fill(25., 0.5, 1.0, &[10., 20., 30.]);
        all.fill(15., 0.5, 1.0, &[10., 20., 30.]);
        assert_eq!(all.eta_phi[0].value(&(0.5, 1.0)), Some(&2.));
        assert_eq!(all.eta_phi[1].value(&(0.5, 1.0)), Some(&1.));
        assert_eq!(all.eta_phi[2].value(&(0.5, 1.0)), Some(&0.));

        let mut triggered = HistogramSet::new(et, EM_ETA, EM_PHI, 3);
        triggered.fill(25., 0.5, 1.0, &[10., 20., 30.]);
        let eff = triggered.efficiency(&all).unwrap();
        let map = eff.eta_phi[0].efficiencies();
        assert_eq!(map.value(&(0.5, 1.0)), Some(&50.));
        let map = eff.eta_phi[1].efficiencies();
        assert_eq!(map.value(&(0.5, 1.0)), Some(&100.));

        let copy = all.clone();
        all.merge(&copy).unwrap();
        assert_eq!(all.et.value(&25.), Some(&2.));
        all.reset();
        assert_eq!(all.et.value(&25.), Some(&0.));
    }

    #[test]
    fn counters() {
        let mut c = Counters {
            seen: 3,
            unbiased: 2,
            passing_cuts: 2,
            triggered: 1,
        };
        c += c;
        assert_eq!(c.seen, 6);
        assert_eq!(c.triggered, 2);
    }

    #[test]
    fn run() {
        let _ = env_logger::builder().is_test(true).try_init();
        let config: EmConfig = from_reader(
            "
et_binning: {nbins: 3, low: 0, high: 30}
thresholds:
  - {bit: 2, label: EM10}
"
            .as_bytes(),
        )
        .unwrap();
        let mut monitor = EmEfficiencyMonitor::new(config);
        monitor.initialize().unwrap();

        let events: Vec<_> = (0..15)
            .map(|number| {
                let mut ev = EventBuilder::new(EventId {
                    run: 7,
                    lumi_block: 1 + number / 5,
                    number: number.into(),
                });
                ev.add_vertex(3, VertexKind::Primary);
                let et = if number < 10 { 5. } else { 25. };
                let electron = Candidate::new(ObjectKind::Electron, et, 0.4, 1.2)
                    .unwrap()
                    .with_quality(Quality::Tight);
                ev.add_candidate(electron);
                if number < 10 {
                    ev.add_em_roi(Roi::new(0.45, 1.2, 4., 1 << 2).unwrap());
                }
                ev.build()
            })
            .collect();
        fill_parallel(&mut monitor, &events).unwrap();
        assert!(monitor.end_interval(Boundary::LumiBlock).unwrap().is_none());

        let summary = monitor.end_interval(Boundary::Run).unwrap().unwrap();
        assert_eq!(summary.counters.events_used, 15);
        assert_eq!(summary.counters.electrons.triggered, 10);
        let eff = &summary.thresholds[0].efficiency.et;
        let bins = &eff.bins()[1..4];
        let effs: Vec<_> = bins.iter().map(|b| b.efficiency).collect();
        assert_eq!(effs, [100., 0., 0.]);
        assert_float_eq!(bins[0].error, 16.797, abs <= 5e-4);
        assert_eq!(bins[1].error, 0.);
        assert_float_eq!(bins[2].error, 30.772, abs <= 5e-4);
    }
}
