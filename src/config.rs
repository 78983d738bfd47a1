use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dead_towers::DeadTowerMap;
use crate::event::Quality;
use crate::histogram::Binning;
use crate::matcher::{EmMatcher, JetMatcher};
use crate::selection::{EmSelection, TriggerGate};
use crate::threshold::ThresholdMenu;

/// Error loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to open the configuration file
    #[error("Failed to open {}", .0.display())]
    Open(PathBuf, #[source] std::io::Error),
    /// Invalid YAML or unknown settings
    #[error("Failed to parse configuration")]
    Parse(#[from] serde_yaml::Error),
}

/// Read a YAML configuration
pub fn from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<T, ConfigError> {
    Ok(serde_yaml::from_reader(reader)?)
}

/// Read a YAML configuration file
pub fn from_path<T, P>(path: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    debug!("Reading configuration from {}", path.display());
    let file =
        File::open(path).map_err(|err| ConfigError::Open(path.to_owned(), err))?;
    from_reader(BufReader::new(file))
}

/// Isolation from the leading RoI of the other trigger type
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Isolation {
    #[serde(default)]
    pub enabled: bool,
    /// Minimum ΔR to the leading RoI
    pub min_delta_r: f64,
    /// Only consider RoIs passing a threshold of this category
    #[serde(default)]
    pub category: Option<String>,
    /// Thresholds of the other trigger type
    #[serde(default)]
    pub thresholds: ThresholdMenu,
}

impl Isolation {
    fn disabled(min_delta_r: f64, category: Option<&str>) -> Self {
        Self {
            enabled: false,
            min_delta_r,
            category: category.map(|c| c.to_owned()),
            thresholds: ThresholdMenu::default(),
        }
    }

    /// Bit mask of the RoIs considered for isolation
    pub fn mask(&self) -> Option<u32> {
        let category = self.category.as_deref()?;
        let mask = self.thresholds.category_mask(category);
        if mask == 0 {
            warn!("No isolation thresholds in category {category}");
        }
        Some(mask)
    }
}

/// Settings of the electron and photon efficiency monitor
#[derive(Builder, Deserialize, Serialize, Clone, Debug)]
#[builder(default)]
#[serde(default)]
pub struct EmConfig {
    pub trigger: TriggerGate,
    /// Minimum number of tracks at any vertex
    pub min_vertex_tracks: usize,
    pub selection: EmSelection,
    pub matcher: EmMatcher,
    /// Only match RoIs passing an EM threshold
    pub em_thresholds_only: bool,
    /// Isolation from jet RoIs
    pub isolation: Isolation,
    /// Transverse energy thresholds for the η-φ maps in GeV
    pub et_thresholds: Vec<f64>,
    pub et_binning: Binning,
    /// Finalise at the end of each lumi block instead of each run
    pub test_merge: bool,
    pub thresholds: ThresholdMenu,
    /// Towers excluded from the "no dead/bad tower" maps
    pub dead_towers: Option<DeadTowerMap>,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerGate::default(),
            min_vertex_tracks: 3,
            selection: EmSelection::default(),
            matcher: EmMatcher::default(),
            em_thresholds_only: true,
            isolation: Isolation::disabled(0.2, None),
            et_thresholds: vec![10., 20., 30.],
            et_binning: Binning::new(100, 0., 100.),
            test_merge: false,
            thresholds: ThresholdMenu::default(),
            dead_towers: None,
        }
    }
}

/// Settings of the jet efficiency monitor
#[derive(Builder, Deserialize, Serialize, Clone, Debug)]
#[builder(default)]
#[serde(default)]
pub struct JetConfig {
    pub trigger: TriggerGate,
    /// Minimum number of tracks at a primary or pile-up vertex
    pub min_vertex_tracks: usize,
    pub min_quality: Quality,
    pub matcher: JetMatcher,
    /// Isolation from EM RoIs
    pub isolation: Isolation,
    /// Transverse energy thresholds for the η-φ maps in GeV
    pub et_thresholds: Vec<f64>,
    pub et_binning: Binning,
    /// Number of central jet thresholds in the RoI word
    pub jet_bits: usize,
    /// Number of forward jet thresholds in the RoI word
    pub forward_jet_bits: usize,
    /// Finalise at the end of each lumi block instead of each run
    pub test_merge: bool,
    pub thresholds: ThresholdMenu,
}

impl Default for JetConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerGate::default(),
            min_vertex_tracks: 4,
            min_quality: Quality::Tight,
            matcher: JetMatcher::default(),
            isolation: Isolation::disabled(0.5, Some("EM")),
            et_thresholds: vec![50., 100., 200.],
            et_binning: Binning::new(200, 0., 1000.),
            jet_bits: 8,
            forward_jet_bits: 4,
            test_merge: false,
            thresholds: ThresholdMenu::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use crate::event::PositionKind;

    fn log_init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn defaults() {
        let em: EmConfig = from_reader("{}".as_bytes()).unwrap();
        assert_eq!(em.min_vertex_tracks, 3);
        assert_eq!(em.et_thresholds, [10., 20., 30.]);
        assert_eq!(em.selection.min_quality, Quality::Tight);
        assert_eq!(em.matcher.position(), PositionKind::RawCluster);
        assert!(!em.trigger.enabled);

        let jet = JetConfigBuilder::default().test_merge(true).build().unwrap();
        assert!(jet.test_merge);
        assert_eq!(jet.min_vertex_tracks, 4);
        assert_eq!(jet.isolation.category.as_deref(), Some("EM"));
    }

    #[test]
    fn yaml_file() {
        log_init();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "
trigger:
  enabled: true
  chains: [EF_g20_loose]
min_vertex_tracks: 2
matcher:
  use_delta_eta_phi: true
  position: offline
thresholds:
  - {{bit: 0, label: EM3}}
  - {{bit: 3, label: TAU6}}
dead_towers: [{{eta: 0.05, phi: 0.05}}]
"
        )
        .unwrap();
        let em: EmConfig = from_path(file.path()).unwrap();
        assert!(em.trigger.enabled);
        assert_eq!(em.min_vertex_tracks, 2);
        assert_eq!(em.matcher.position(), PositionKind::Offline);
        assert_eq!(em.thresholds.category_mask("EM"), 1);
        assert_eq!(em.dead_towers.map(|d| d.towers().len()), Some(1));
    }

    #[test]
    fn errors() {
        log_init();
        assert!(matches!(
            from_path::<EmConfig, _>("/nonexistent/l1calo.yaml"),
            Err(ConfigError::Open(..))
        ));
        assert!(matches!(
            from_reader::<JetConfig, _>("et_thresholds: seven".as_bytes()),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            from_reader::<EmConfig, _>("et_binning: {nbins: 0, low: 0, high: 100}".as_bytes()),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            from_reader::<JetConfig, _>("et_binning: {nbins: 10, low: 100, high: 0}".as_bytes()),
            Err(ConfigError::Parse(_))
        ));
    }
}
