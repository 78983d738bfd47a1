//! `l1calo_eff` measures the efficiency of the level-1 calorimeter
//! trigger from offline reconstructed objects.
//!
//! Offline electrons, photons and jets are matched geometrically to
//! the regions of interest (RoIs) reported by the trigger. For each
//! trigger threshold, the transverse energy spectrum and η-φ
//! distribution of matched objects is divided by that of all selected
//! objects, yielding efficiencies with binomial errors.
//!
//! # How to use
//!
//! Create an [EmEfficiencyMonitor](monitor::em::EmEfficiencyMonitor)
//! or a [JetEfficiencyMonitor](monitor::jet::JetEfficiencyMonitor)
//! from a configuration, call
//! [initialize](traits::Monitor::initialize), fill it with events, and
//! collect the efficiencies at the end of each run with
//! [end_interval](traits::Monitor::end_interval).
//!
//! ## Most relevant modules
//!
//! - [prelude] exports a list of the most relevant classes and objects
//! - [monitor] contains the efficiency monitors
//! - [matcher] for matching offline objects to RoIs
//! - [efficiency] for the efficiency and error computation
//! - [config] for settings and reading them from YAML files
//!

/// Raw calorimeter clusters
pub mod cluster;
/// Monitor settings
pub mod config;
/// Maps of dead and bad calorimeter towers
pub mod dead_towers;
/// Efficiencies with errors
pub mod efficiency;
/// Event content
pub mod event;
/// Histogram helpers
pub mod histogram;
/// Angular coordinates and distances
pub mod kinematics;
/// Geometric matching of offline objects to RoIs
pub mod matcher;
/// Efficiency monitors
pub mod monitor;
/// Most important exports
pub mod prelude;
/// Detector regions in pseudorapidity
pub mod region;
/// Event and object selection
pub mod selection;
/// Trigger thresholds
pub mod threshold;
/// Common traits
pub mod traits;

use lazy_static::lazy_static;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
lazy_static! {
    pub static ref VERSION_MAJOR: u32 =
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
    pub static ref VERSION_MINOR: u32 =
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
    pub static ref VERSION_PATCH: u32 =
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap();
}
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
