use std::default::Default;

use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::cluster::{raw_cluster, CaloCell};
use crate::kinematics::{checked, InvalidCoordinate, Position};
use crate::region::{EmRegion, JetRegion};

/// Kind of offline-reconstructed object
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Electron,
    Photon,
    Jet,
}

/// Identification quality assigned during offline reconstruction
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
    PartialOrd,
    Ord,
    Hash,
)]
pub enum Quality {
    #[default]
    None,
    Loose,
    Medium,
    Tight,
}

/// Which position of an offline object to use
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
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    /// Calibrated calorimeter cluster
    Cluster,
    /// Cluster reconstructed from uncalibrated cells
    #[default]
    RawCluster,
    /// Offline object (e.g. track-based for electrons)
    Offline,
}

/// An offline-reconstructed electron, photon, or jet
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    kind: ObjectKind,
    /// Transverse energy in GeV
    et: N64,
    position: Position,
    #[serde(default)]
    cluster: Option<Position>,
    #[serde(default)]
    raw_cluster: Option<Position>,
    #[serde(default)]
    raw_et: Option<N64>,
    #[serde(default)]
    quality: Quality,
    #[serde(default = "default_author")]
    standard_author: bool,
}

fn default_author() -> bool {
    true
}

impl Candidate {
    /// A new candidate with transverse energy `et` in GeV
    pub fn new(
        kind: ObjectKind,
        et: f64,
        eta: f64,
        phi: f64,
    ) -> Result<Self, InvalidCoordinate> {
        Ok(Self {
            kind,
            et: checked("et", et)?,
            position: Position::new(eta, phi)?,
            cluster: None,
            raw_cluster: None,
            raw_et: None,
            quality: Quality::None,
            standard_author: true,
        })
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Whether the object was found by the standard reconstruction
    pub fn with_standard_author(mut self, standard: bool) -> Self {
        self.standard_author = standard;
        self
    }

    /// Set the calibrated cluster position
    pub fn with_cluster(mut self, position: Position) -> Self {
        self.cluster = Some(position);
        self
    }

    /// Set raw cluster transverse energy and position
    pub fn with_raw_cluster(mut self, et: N64, position: Position) -> Self {
        self.raw_et = Some(et);
        self.raw_cluster = Some(position);
        self
    }

    /// Derive raw cluster transverse energy and position from `cells`
    ///
    /// If the cells carry no positive energy, the raw cluster is left
    /// unchanged.
    pub fn with_cells(self, cells: &[CaloCell]) -> Self {
        match raw_cluster(cells) {
            Some(raw) => self.with_raw_cluster(raw.et, raw.position),
            None => self,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn et(&self) -> N64 {
        self.et
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn standard_author(&self) -> bool {
        self.standard_author
    }

    /// Offline object position
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The requested position, falling back to the offline position
    pub fn position_of(&self, kind: PositionKind) -> &Position {
        let pos = match kind {
            PositionKind::Cluster => self.cluster.as_ref(),
            PositionKind::RawCluster => self.raw_cluster.as_ref(),
            PositionKind::Offline => None,
        };
        pos.unwrap_or(&self.position)
    }

    /// Transverse energy belonging to the requested position
    pub fn et_of(&self, kind: PositionKind) -> N64 {
        match kind {
            PositionKind::RawCluster => self.raw_et.unwrap_or(self.et),
            _ => self.et,
        }
    }

    pub fn em_region(&self) -> EmRegion {
        EmRegion::classify(self.position.eta())
    }

    pub fn jet_region(&self) -> JetRegion {
        JetRegion::classify(self.position.eta())
    }
}

/// A hardware trigger region of interest
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Roi {
    position: Position,
    /// Energy at threshold in GeV
    et: N64,
    /// Bit mask of passed thresholds
    roi_word: u32,
}

impl Roi {
    pub fn new(
        eta: f64,
        phi: f64,
        et: f64,
        roi_word: u32,
    ) -> Result<Self, InvalidCoordinate> {
        Ok(Self {
            position: Position::new(eta, phi)?,
            et: checked("et", et)?,
            roi_word,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn et(&self) -> N64 {
        self.et
    }

    pub fn roi_word(&self) -> u32 {
        self.roi_word
    }
}

/// Kind of reconstructed vertex
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    #[default]
    Primary,
    Pileup,
    Other,
}

/// A reconstructed vertex
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Vertex {
    pub ntracks: usize,
    #[serde(default)]
    pub kind: VertexKind,
}

/// Event identification
#[derive(
    Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct EventId {
    pub run: u32,
    pub lumi_block: u32,
    pub number: u64,
}

/// All inputs needed by the efficiency monitors for a single event
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    id: EventId,
    #[serde(default)]
    vertices: Vec<Vertex>,
    #[serde(default)]
    electrons: Vec<Candidate>,
    #[serde(default)]
    photons: Vec<Candidate>,
    #[serde(default)]
    jets: Vec<Candidate>,
    #[serde(default)]
    em_rois: Vec<Roi>,
    #[serde(default)]
    jet_rois: Vec<Roi>,
    #[serde(default)]
    passed_triggers: Vec<String>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn electrons(&self) -> &[Candidate] {
        &self.electrons
    }

    pub fn photons(&self) -> &[Candidate] {
        &self.photons
    }

    pub fn jets(&self) -> &[Candidate] {
        &self.jets
    }

    /// EM/tau RoIs
    pub fn em_rois(&self) -> &[Roi] {
        &self.em_rois
    }

    pub fn jet_rois(&self) -> &[Roi] {
        &self.jet_rois
    }

    /// Names of trigger chains that passed
    pub fn passed_triggers(&self) -> &[String] {
        &self.passed_triggers
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(id: EventId) -> Self {
        Self {
            event: Event {
                id,
                ..Default::default()
            },
        }
    }

    pub fn add_vertex(&mut self, ntracks: usize, kind: VertexKind) -> &mut Self {
        self.event.vertices.push(Vertex { ntracks, kind });
        self
    }

    /// Add an offline object, sorted by its kind
    pub fn add_candidate(&mut self, c: Candidate) -> &mut Self {
        match c.kind() {
            ObjectKind::Electron => self.event.electrons.push(c),
            ObjectKind::Photon => self.event.photons.push(c),
            ObjectKind::Jet => self.event.jets.push(c),
        }
        self
    }

    pub fn add_em_roi(&mut self, roi: Roi) -> &mut Self {
        self.event.em_rois.push(roi);
        self
    }

    pub fn add_jet_roi(&mut self, roi: Roi) -> &mut Self {
        self.event.jet_rois.push(roi);
        self
    }

    pub fn add_passed_trigger(&mut self, name: impl Into<String>) -> &mut Self {
        self.event.passed_triggers.push(name.into());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

impl From<EventBuilder> for Event {
    fn from(b: EventBuilder) -> Self {
        b.build()
    }
}
