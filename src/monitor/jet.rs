use log::{debug, info, warn};
use ndhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::config::JetConfig;
use crate::efficiency::{Efficiency, Efficiency1D, Efficiency2D};
use crate::event::{Candidate, Event};
use crate::histogram::{
    hist1d, hist2d, merge_into, reset, Binning, Hist1D, Hist2D, JET_ETA,
    JET_PHI,
};
use crate::matcher::{is_isolated, JetMatcher};
use crate::monitor::{
    Boundary, Counters, HistogramSet, Lifecycle, LifecycleError, MonitorError,
    ThresholdEfficiency,
};
use crate::region::JetRegion;
use crate::selection::num_primary_vertices;
use crate::threshold::{is_set, FORWARD_JET_FIRST_BIT};
use crate::traits::{Match, Monitor};

/// Binning of the vertex multiplicity histogram
const VERTEX_BINNING: Binning = Binning::new(30, 0., 30.);

/// Event and object counts of the jet monitor
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct JetCounters {
    pub events: u64,
    /// Events passing the trigger and vertex requirements
    pub events_used: u64,
    pub jets: Counters,
}

#[derive(Clone, Debug)]
struct JetHistograms {
    vertices: Hist1D,
    all: HistogramSet,
    central: Hist1D,
    forward: Hist1D,
    eta_phi: Hist2D,
    triggered: Hist1D,
    triggered_central: Hist1D,
    triggered_forward: Hist1D,
    triggered_eta_phi: Hist2D,
    jets: Vec<HistogramSet>,
    forward_jets: Vec<HistogramSet>,
}

impl JetHistograms {
    fn hist1d_mut(&mut self) -> [&mut Hist1D; 6] {
        [
            &mut self.vertices,
            &mut self.central,
            &mut self.forward,
            &mut self.triggered,
            &mut self.triggered_central,
            &mut self.triggered_forward,
        ]
    }

    fn hist1d(&self) -> [&Hist1D; 6] {
        [
            &self.vertices,
            &self.central,
            &self.forward,
            &self.triggered,
            &self.triggered_central,
            &self.triggered_forward,
        ]
    }

    fn sets_mut(&mut self) -> impl Iterator<Item = &mut HistogramSet> {
        std::iter::once(&mut self.all)
            .chain(self.jets.iter_mut())
            .chain(self.forward_jets.iter_mut())
    }

    fn sets(&self) -> impl Iterator<Item = &HistogramSet> {
        std::iter::once(&self.all)
            .chain(self.jets.iter())
            .chain(self.forward_jets.iter())
    }

    fn merge(&mut self, other: &Self) -> Result<(), MonitorError> {
        for (hist, other) in self.hist1d_mut().into_iter().zip(other.hist1d()) {
            merge_into(hist, other)?;
        }
        merge_into(&mut self.eta_phi, &other.eta_phi)?;
        merge_into(&mut self.triggered_eta_phi, &other.triggered_eta_phi)?;
        for (set, other) in self.sets_mut().zip(other.sets()) {
            set.merge(other)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.hist1d_mut().into_iter().for_each(reset);
        reset(&mut self.eta_phi);
        reset(&mut self.triggered_eta_phi);
        self.sets_mut().for_each(HistogramSet::reset);
    }
}

/// Efficiencies of the jet monitor at the end of an interval
#[derive(Clone, Debug)]
pub struct JetSummary {
    pub counters: JetCounters,
    /// Multiplicity of primary and pile-up vertices
    pub vertices: Hist1D,
    /// Efficiency to match any jet RoI
    pub triggered: Efficiency1D,
    /// Matching efficiency for |η| below the transition band
    pub triggered_central: Efficiency1D,
    /// Matching efficiency from the transition band on
    pub triggered_forward: Efficiency1D,
    pub triggered_eta_phi: Efficiency2D,
    /// Efficiencies for each central jet threshold
    pub jets: Vec<ThresholdEfficiency>,
    /// Efficiencies for each forward jet threshold, or its linked
    /// central threshold
    pub forward_jets: Vec<ThresholdEfficiency>,
}

/// Jet trigger efficiency monitor
///
/// Central jets are counted for the jet thresholds passed by the
/// matched RoI. Forward jets are counted for the forward thresholds,
/// where a forward jet threshold is satisfied if either the forward
/// threshold or the linked central threshold is passed.
#[derive(Clone, Debug)]
pub struct JetEfficiencyMonitor {
    config: JetConfig,
    isolation_mask: Option<u32>,
    forward_links: Vec<usize>,
    lifecycle: Lifecycle,
    histograms: Option<JetHistograms>,
    counters: JetCounters,
}

impl JetEfficiencyMonitor {
    pub fn new(config: JetConfig) -> Self {
        let isolation_mask = config.isolation.mask();
        Self {
            config,
            isolation_mask,
            forward_links: Vec::new(),
            lifecycle: Lifecycle::Configured,
            histograms: None,
            counters: JetCounters::default(),
        }
    }

    pub fn config(&self) -> &JetConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn counters(&self) -> &JetCounters {
        &self.counters
    }

    /// Central jet bit linked to each forward jet bit
    pub fn forward_links(&self) -> &[usize] {
        &self.forward_links
    }

    fn book(&self) -> JetHistograms {
        let et = self.config.et_binning;
        let ncuts = self.config.et_thresholds.len();
        let set = HistogramSet::new(et, JET_ETA, JET_PHI, ncuts);
        JetHistograms {
            vertices: hist1d(VERTEX_BINNING),
            all: set.clone(),
            central: hist1d(et),
            forward: hist1d(et),
            eta_phi: hist2d(JET_ETA, JET_PHI),
            triggered: hist1d(et),
            triggered_central: hist1d(et),
            triggered_forward: hist1d(et),
            triggered_eta_phi: hist2d(JET_ETA, JET_PHI),
            jets: vec![set.clone(); self.config.jet_bits],
            forward_jets: vec![set; self.config.forward_jet_bits],
        }
    }

    fn histograms(
        &self,
        operation: &'static str,
    ) -> Result<&JetHistograms, LifecycleError> {
        self.histograms.as_ref().ok_or(LifecycleError {
            operation,
            state: self.lifecycle,
        })
    }

    fn label(&self, bit: usize) -> Option<String> {
        self.config.thresholds.label(bit).map(|l| l.to_owned())
    }

    /// Compute all efficiencies from the current histograms
    ///
    /// Forward jet numerators are combined with the numerators of the
    /// linked central thresholds. The stored histograms are left
    /// unchanged, so this can be called repeatedly.
    pub fn efficiencies(&self) -> Result<JetSummary, MonitorError> {
        let hists = self.histograms("compute efficiencies of")?;
        let jets = hists
            .jets
            .iter()
            .enumerate()
            .map(|(bit, set)| {
                Ok(ThresholdEfficiency {
                    bit,
                    label: self.label(bit),
                    efficiency: set.efficiency(&hists.all)?,
                    good_towers: Vec::new(),
                })
            })
            .collect::<Result<_, MonitorError>>()?;
        let forward_jets = hists
            .forward_jets
            .iter()
            .enumerate()
            .map(|(k, set)| {
                let mut combined = set.clone();
                let linked = self.forward_links.get(k).and_then(|&bit| hists.jets.get(bit));
                if let Some(linked) = linked {
                    combined.merge(linked)?;
                }
                let bit = FORWARD_JET_FIRST_BIT + k;
                Ok(ThresholdEfficiency {
                    bit,
                    label: self.label(bit),
                    efficiency: combined.efficiency(&hists.all)?,
                    good_towers: Vec::new(),
                })
            })
            .collect::<Result<_, MonitorError>>()?;
        Ok(JetSummary {
            counters: self.counters,
            vertices: hists.vertices.clone(),
            triggered: Efficiency::new(&hists.triggered, &hists.all.et)?,
            triggered_central: Efficiency::new(&hists.triggered_central, &hists.central)?,
            triggered_forward: Efficiency::new(&hists.triggered_forward, &hists.forward)?,
            triggered_eta_phi: Efficiency::new(&hists.triggered_eta_phi, &hists.eta_phi)?,
            jets,
            forward_jets,
        })
    }
}

struct Analysis<'a> {
    config: &'a JetConfig,
    isolation_mask: Option<u32>,
    forward_links: &'a [usize],
}

impl<'a> Analysis<'a> {
    fn analyse(
        &self,
        jet: &Candidate,
        event: &Event,
        hists: &mut JetHistograms,
        counters: &mut Counters,
    ) {
        counters.seen += 1;
        let isolation = &self.config.isolation;
        if isolation.enabled
            && !is_isolated(
                jet.position(),
                event.em_rois(),
                self.isolation_mask,
                isolation.min_delta_r,
            )
        {
            debug!("Jet at {:?} is not isolated from EM RoIs", jet.position());
            return;
        }
        counters.unbiased += 1;

        if jet.quality() < self.config.min_quality || jet.et() <= 0. {
            return;
        }
        counters.passing_cuts += 1;

        let et = jet.et().raw();
        let eta = jet.position().eta().raw();
        let phi = jet.position().l1calo_phi().raw();
        let region = jet.jet_region();
        let et_cuts = &self.config.et_thresholds;

        hists.all.fill(et, eta, phi, et_cuts);
        hists.eta_phi.fill(&(eta, phi));
        if region == JetRegion::Central {
            hists.central.fill(&et);
        } else {
            hists.forward.fill(&et);
        }

        let res = self.config.matcher.best_match(jet, event.jet_rois());
        if !res.matched {
            return;
        }
        counters.triggered += 1;
        hists.triggered.fill(&et);
        hists.triggered_eta_phi.fill(&(eta, phi));
        if region == JetRegion::Central {
            hists.triggered_central.fill(&et);
        } else {
            hists.triggered_forward.fill(&et);
        }

        let word = res.roi_word;
        if region == JetRegion::Central {
            for (bit, set) in hists.jets.iter_mut().enumerate() {
                if is_set(word, bit) {
                    set.fill(et, eta, phi, et_cuts);
                }
            }
        } else if res.forward {
            for (k, set) in hists.forward_jets.iter_mut().enumerate() {
                if is_set(word, FORWARD_JET_FIRST_BIT + k) {
                    set.fill(et, eta, phi, et_cuts);
                }
            }
        } else {
            // transition band matched to a central RoI
            for bit in (0..self.config.jet_bits).filter(|&bit| is_set(word, bit)) {
                let linked = self.forward_links.iter().rposition(|&b| b == bit);
                if let Some(set) = linked.and_then(|k| hists.forward_jets.get_mut(k)) {
                    set.fill(et, eta, phi, et_cuts);
                }
            }
        }
    }
}

impl Monitor for JetEfficiencyMonitor {
    type Error = MonitorError;
    type Summary = JetSummary;

    fn initialize(&mut self) -> Result<(), Self::Error> {
        self.lifecycle.initialize()?;
        if self.config.jet_bits > FORWARD_JET_FIRST_BIT {
            warn!(
                "{} jet thresholds overlap with forward jet thresholds",
                self.config.jet_bits
            );
        }
        self.forward_links = self
            .config
            .thresholds
            .forward_jet_links(self.config.forward_jet_bits);
        info!(
            "Booked jet efficiency histograms for {} jet and {} forward jet thresholds",
            self.config.jet_bits, self.config.forward_jet_bits
        );
        if self.config.trigger.enabled {
            info!("Trigger chains: {}", self.config.trigger.chains.join(" "));
        }
        self.histograms = Some(self.book());
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
        let nvertices =
            num_primary_vertices(event.vertices(), self.config.min_vertex_tracks);
        if nvertices < 1 {
            debug!("Event {} fails vertex requirements", id.number);
            return Ok(());
        }
        hists.vertices.fill(&(nvertices as f64));
        counters.events_used += 1;

        let analysis = Analysis {
            config: &self.config,
            isolation_mask: self.isolation_mask,
            forward_links: &self.forward_links,
        };
        for jet in event.jets() {
            analysis.analyse(jet, event, hists, &mut counters.jets);
        }
        debug!("Jets: {:?}", counters.jets);
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
            "{boundary}: {} events, {} offline jets, {} triggered",
            self.counters.events, self.counters.jets.seen, self.counters.jets.triggered
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
            isolation_mask: self.isolation_mask,
            forward_links: self.forward_links.clone(),
            lifecycle: Lifecycle::Initialized,
            histograms: Some(self.book()),
            counters: JetCounters::default(),
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
        self.counters.jets += other.counters.jets;
        Ok(())
    }
}
