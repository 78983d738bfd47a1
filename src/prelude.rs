pub use crate::{
    config::{EmConfig, EmConfigBuilder, JetConfig, JetConfigBuilder},
    efficiency::{Efficiency1D, Efficiency2D},
    event::{Candidate, Event, EventBuilder, EventId, Roi},
    matcher::{EmMatcher, JetMatcher},
    monitor::{
        em::EmEfficiencyMonitor, fill_parallel, jet::JetEfficiencyMonitor,
        Boundary,
    },
    threshold::ThresholdMenu,
    traits::{Match, Monitor},
};
