use crate::event::{Candidate, Event, Roi};
use crate::matcher::MatchResult;
use crate::monitor::Boundary;

/// Geometric matching of an offline object to trigger RoIs
pub trait Match {
    fn best_match(&self, candidate: &Candidate, rois: &[Roi]) -> MatchResult;
}

/// Per-event efficiency monitoring
pub trait Monitor: Sized {
    type Error;
    type Summary;

    /// Book histograms
    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Fill histograms from a single event
    fn fill(&mut self, event: &Event) -> Result<(), Self::Error>;

    /// Handle the end of an accumulation interval
    ///
    /// Returns the efficiencies if `boundary` finalises the monitor.
    fn end_interval(
        &mut self,
        boundary: Boundary,
    ) -> Result<Option<Self::Summary>, Self::Error>;

    /// An initialised monitor with the same settings and empty histograms
    fn partial(&self) -> Result<Self, Self::Error>;

    /// Add the histograms and counters of `other`
    fn merge(&mut self, other: Self) -> Result<(), Self::Error>;
}
