use log::debug;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::{Candidate, Quality, Vertex, VertexKind};
use crate::region::in_good_em_eta_range;

/// Event selection on trigger chains that passed
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TriggerGate {
    pub enabled: bool,
    pub chains: Vec<String>,
}

impl TriggerGate {
    pub fn new<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            chains: chains.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// Whether an event with the given passed chains is accepted
    pub fn accepts(&self, passed: &[String]) -> bool {
        if !self.enabled {
            return true;
        }
        let first = self.chains.iter().find(|&c| passed.contains(c));
        if let Some(chain) = first {
            debug!("First requested trigger that fired: {chain}");
        }
        first.is_some()
    }
}

/// Whether any vertex has at least `min_tracks` tracks
pub fn has_vertex_with_tracks(vertices: &[Vertex], min_tracks: usize) -> bool {
    vertices.iter().any(|v| v.ntracks >= min_tracks)
}

/// Number of primary and pile-up vertices with at least `min_tracks` tracks
pub fn num_primary_vertices(vertices: &[Vertex], min_tracks: usize) -> usize {
    vertices
        .iter()
        .filter(|v| matches!(v.kind, VertexKind::Primary | VertexKind::Pileup))
        .filter(|v| v.ntracks >= min_tracks)
        .count()
}

/// Object selection for the electron and photon efficiencies
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EmSelection {
    pub min_quality: Quality,
    /// Reject objects in the barrel/endcap transition region
    pub exclude_transition: bool,
}

impl Default for EmSelection {
    fn default() -> Self {
        Self {
            min_quality: Quality::Tight,
            exclude_transition: true,
        }
    }
}

impl EmSelection {
    /// Quality and reconstruction requirements
    pub fn identified(&self, c: &Candidate) -> bool {
        c.quality() >= self.min_quality && c.standard_author()
    }

    /// Kinematic requirements at the position used for the efficiencies
    pub fn in_acceptance(&self, et: N64, eta: N64) -> bool {
        et > 0. && in_good_em_eta_range(eta, self.exclude_transition)
    }
}
