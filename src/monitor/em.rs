use log::{debug, info, warn};
use ndhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::config::EmConfig;
use crate::efficiency::{Efficiency, Efficiency1D};
use crate::event::{Candidate, Event};
use crate::histogram::{
    hist1d, hist2d, merge_into, reset, Hist1D, Hist2D, EM_ETA, EM_PHI,
};
use crate::matcher::{is_isolated, EmMatcher};
use crate::monitor::{
    efficiencies, fill_maps, merge_maps, Boundary, Counters, HistogramSet,
    Lifecycle, LifecycleError, MonitorError, ThresholdEfficiency,
};
use crate::selection::has_vertex_with_tracks;
use crate::threshold::is_set;
use crate::traits::{Match, Monitor};

/// Threshold category of EM RoIs
const EM_CATEGORY: &str = "EM";

/// Event and object counts of the EM monitor
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EmCounters {
    pub events: u64,
    /// Events passing the trigger and vertex requirements
    pub events_used: u64,
    pub electrons: Counters,
    pub photons: Counters,
}

#[derive(Clone, Debug)]
struct ThresholdHistograms {
    bit: usize,
    triggered: HistogramSet,
    good_towers: Vec<Hist2D>,
}

#[derive(Clone, Debug)]
struct EmHistograms {
    all: HistogramSet,
    triggered: Hist1D,
    thresholds: Vec<ThresholdHistograms>,
}

impl EmHistograms {
    fn merge(&mut self, other: &Self) -> Result<(), MonitorError> {
        self.all.merge(&other.all)?;
        merge_into(&mut self.triggered, &other.triggered)?;
        for (th, other) in self.thresholds.iter_mut().zip(&other.thresholds) {
            th.triggered.merge(&other.triggered)?;
            merge_maps(&mut th.good_towers, &other.good_towers)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.all.reset();
        reset(&mut self.triggered);
        for th in &mut self.thresholds {
            th.triggered.reset();
            th.good_towers.iter_mut().for_each(reset);
        }
    }
}

/// Efficiencies of the EM monitor at the end of an interval
#[derive(Clone, Debug)]
pub struct EmSummary {
    pub counters: EmCounters,
    /// Efficiency to match any EM RoI
    pub triggered: Efficiency1D,
    /// Efficiencies for each EM threshold
    pub thresholds: Vec<ThresholdEfficiency>,
}

/// Electron and photon trigger efficiency monitor
///
/// Offline electrons and photons passing the selection fill the
/// denominator histograms. Those matched to an EM RoI fill the
/// numerators of every EM threshold set in the RoI word.
#[derive(Clone, Debug)]
pub struct EmEfficiencyMonitor {
    config: EmConfig,
    matcher: EmMatcher,
    isolation_mask: Option<u32>,
    lifecycle: Lifecycle,
    histograms: Option<EmHistograms>,
    counters: EmCounters,
}

impl EmEfficiencyMonitor {
    pub fn new(config: EmConfig) -> Self {
        let mut matcher = config.matcher.clone();
        if config.em_thresholds_only {
            matcher.set_required_mask(Some(
                config.thresholds.category_mask(EM_CATEGORY),
            ));
        }
        let isolation_mask = config.isolation.mask();
        Self {
            config,
            matcher,
            isolation_mask,
            lifecycle: Lifecycle::Configured,
            histograms: None,
            counters: EmCounters::default(),
        }
    }

    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn counters(&self) -> &EmCounters {
        &self.counters
    }

    /// RoI bits of EM thresholds
    fn em_bits(&self) -> Vec<usize> {
        self.config
            .thresholds
            .thresholds()
            .filter(|(_, label)| label.contains(EM_CATEGORY))
            .map(|(bit, _)| bit)
            .collect()
    }

    fn book(&self) -> EmHistograms {
        let ncuts = self.config.et_thresholds.len();
        let nmaps = if self.config.dead_towers.is_some() {
            ncuts
        } else {
            0
        };
        let et = self.config.et_binning;
        let thresholds = self
            .em_bits()
            .into_iter()
            .map(|bit| ThresholdHistograms {
                bit,
                triggered: HistogramSet::new(et, EM_ETA, EM_PHI, ncuts),
                good_towers: vec![hist2d(EM_ETA, EM_PHI); nmaps],
            })
            .collect();
        EmHistograms {
            all: HistogramSet::new(et, EM_ETA, EM_PHI, ncuts),
            triggered: hist1d(et),
            thresholds,
        }
    }

    fn histograms(&self, operation: &'static str) -> Result<&EmHistograms, LifecycleError> {
        self.histograms.as_ref().ok_or(LifecycleError {
            operation,
            state: self.lifecycle,
        })
    }

    /// Compute all efficiencies from the current histograms
    ///
    /// This does not change the state of the monitor and can be called
    /// at any point after initialisation.
    pub fn efficiencies(&self) -> Result<EmSummary, MonitorError> {
        let hists = self.histograms("compute efficiencies of")?;
        let thresholds = hists
            .thresholds
            .iter()
            .map(|th| {
                Ok(ThresholdEfficiency {
                    bit: th.bit,
                    label: self.config.thresholds.label(th.bit).map(|l| l.to_owned()),
                    efficiency: th.triggered.efficiency(&hists.all)?,
                    good_towers: if th.good_towers.is_empty() {
                        Vec::new()
                    } else {
                        efficiencies(&th.good_towers, &hists.all.eta_phi)?
                    },
                })
            })
            .collect::<Result<_, MonitorError>>()?;
        Ok(EmSummary {
            counters: self.counters,
            triggered: Efficiency::new(&hists.triggered, &hists.all.et)?,
            thresholds,
        })
    }
}

struct Analysis<'a> {
    config: &'a EmConfig,
    matcher: &'a EmMatcher,
    isolation_mask: Option<u32>,
}

impl<'a> Analysis<'a> {
    fn analyse(
        &self,
        candidate: &Candidate,
        event: &Event,
        hists: &mut EmHistograms,
        counters: &mut Counters,
    ) {
        counters.seen += 1;
        let kind = self.matcher.position();
        let position = candidate.position_of(kind);
        let et = candidate.et_of(kind);

        let isolation = &self.config.isolation;
        if isolation.enabled
            && !is_isolated(
                position,
                event.jet_rois(),
                self.isolation_mask,
                isolation.min_delta_r,
            )
        {
            debug!("Candidate at {position:?} is not isolated from jet RoIs");
            return;
        }
        counters.unbiased += 1;

        let selection = &self.config.selection;
        if !selection.identified(candidate)
            || !selection.in_acceptance(et, position.eta())
        {
            return;
        }
        counters.passing_cuts += 1;

        let (et, eta, phi) = (et.raw(), position.eta().raw(), position.phi().raw());
        let et_cuts = &self.config.et_thresholds;
        hists.all.fill(et, eta, phi, et_cuts);

        let res = self.matcher.best_match(candidate, event.em_rois());
        if !res.matched {
            return;
        }
        counters.triggered += 1;
        hists.triggered.fill(&et);

        let good_tower = self
            .config
            .dead_towers
            .as_ref()
            .map_or(true, |dead| !dead.is_flagged(position));
        for th in &mut hists.thresholds {
            if !is_set(res.roi_word, th.bit) {
                continue;
            }
            th.triggered.fill(et, eta, phi, et_cuts);
            if good_tower {
                fill_maps(&mut th.good_towers, et, eta, phi, et_cuts);
            }
        }
    }
}

impl Monitor for EmEfficiencyMonitor {
    type Error = MonitorError;
    type Summary = EmSummary;

    fn initialize(&mut self) -> Result<(), Self::Error> {
        self.lifecycle.initialize()?;
        let hists = self.book();
        if hists.thresholds.is_empty() {
            warn!("No EM thresholds configured");
        }
        info!(
            "Booked EM efficiency histograms for {} thresholds",
            hists.thresholds.len()
        );
        if self.config.trigger.enabled {
            info!("Trigger chains: {}", self.config.trigger.chains.join(" "));
        }
        self.histograms = Some(hists);
        Ok(())
    }

    fn fill(&mut self, event: &Event) -> Result<(), Self::Error> {
        self.lifecycle.fill()?;
        let Some(hists) = self.histograms.as_mut() else {
            return Err(LifecycleError {
                operation: "fill",
                state: self.lifecycle,
            }
            .into());
        };
        let counters = &mut self.counters;
        counters.events += 1;
        let id = event.id();
        debug!(
            "Run {} : Lumi Block {} : Event {}",
            id.run, id.lumi_block, id.number
        );

        if !self.config.trigger.accepts(event.passed_triggers()) {
            debug!("Event {} fails trigger requirements", id.number);
            return Ok(());
        }
        if !has_vertex_with_tracks(event.vertices(), self.config.min_vertex_tracks) {
            debug!("Event {} fails vertex requirements", id.number);
            return Ok(());
        }
        counters.events_used += 1;

        let analysis = Analysis {
            config: &self.config,
            matcher: &self.matcher,
            isolation_mask: self.isolation_mask,
        };
        for electron in event.electrons() {
            analysis.analyse(electron, event, hists, &mut counters.electrons);
        }
        for photon in event.photons() {
            analysis.analyse(photon, event, hists, &mut counters.photons);
        }
        debug!(
            "Electrons: {:?}, photons: {:?}",
            counters.electrons, counters.photons
        );
        Ok(())
    }

    fn end_interval(
        &mut self,
        boundary: Boundary,
    ) -> Result<Option<Self::Summary>, Self::Error> {
        self.lifecycle.require_booked("end interval of")?;
        if !boundary.finalizes(self.config.test_merge) {
            return Ok(None);
        }
        let summary = self.efficiencies()?;
        info!(
            "{boundary}: {} events, {} offline electrons, {} offline photons",
            self.counters.events,
            self.counters.electrons.seen,
            self.counters.photons.seen
        );
        self.lifecycle.finalize()?;
        if let Some(hists) = self.histograms.as_mut() {
            hists.reset();
        }
        Ok(Some(summary))
    }

    fn partial(&self) -> Result<Self, Self::Error> {
        self.lifecycle.require_booked("split")?;
        Ok(Self {
            config: self.config.clone(),
            matcher: self.matcher.clone(),
            isolation_mask: self.isolation_mask,
            lifecycle: Lifecycle::Initialized,
            histograms: Some(self.book()),
            counters: EmCounters::default(),
        })
    }

    fn merge(&mut self, other: Self) -> Result<(), Self::Error> {
        self.lifecycle.merge(other.lifecycle)?;
        if let (Some(hists), Some(other)) =
            (self.histograms.as_mut(), other.histograms.as_ref())
        {
            hists.merge(other)?;
        }
        self.counters.events += other.counters.events;
        self.counters.events_used += other.counters.events_used;
        self.counters.electrons += other.counters.electrons;
        self.counters.photons += other.counters.photons;
        Ok(())
    }
}
