use ndhistogram::axis::{Axis, Uniform};
use ndhistogram::{AxesTuple, Histogram, VecHistogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::histogram::check_binning;

/// Display range of one-dimensional efficiency histograms in percent
pub const DISPLAY_RANGE: (f64, f64) = (0., 110.);

/// Confidence parameter of the error estimate at 0% and 100% efficiency
pub const BOUNDARY_CONFIDENCE: f64 = 0.159;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EfficiencyError {
    #[error("Numerator binning ({numerator} bins) differs from denominator binning ({denominator} bins)")]
    BinningMismatch { numerator: usize, denominator: usize },
    #[error("Numerator {numerator} exceeds denominator {denominator} in bin {bin}")]
    NumeratorExceedsDenominator {
        bin: usize,
        numerator: f64,
        denominator: f64,
    },
    #[error("Invalid entry {value} in bin {bin}")]
    InvalidEntry { bin: usize, value: f64 },
}

/// A single bin of an efficiency histogram
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct EfficiencyBin {
    pub numerator: f64,
    pub denominator: f64,
    /// Efficiency in percent
    pub efficiency: f64,
    /// Statistical uncertainty in percent
    pub error: f64,
}

impl EfficiencyBin {
    /// Compute efficiency and error from validated counts
    ///
    /// Empty bins have zero efficiency and zero error. At 0% and above
    /// 99% the binomial error vanishes or is unreliable, so a one-sided
    /// interval `1 - 0.159^(1/d)` is used instead.
    pub fn new(numerator: f64, denominator: f64) -> Self {
        if denominator <= 0. {
            return Self {
                numerator,
                denominator,
                efficiency: 0.,
                error: 0.,
            };
        }
        let eff = numerator / denominator;
        let error = if eff == 0. || eff > 0.99 {
            1. - BOUNDARY_CONFIDENCE.powf(1. / denominator)
        } else {
            (eff * (1. - eff) / denominator).sqrt()
        };
        Self {
            numerator,
            denominator,
            efficiency: 100. * eff,
            error: 100. * error,
        }
    }
}

fn validate(
    bin: usize,
    numerator: f64,
    denominator: f64,
) -> Result<(), EfficiencyError> {
    for value in [numerator, denominator] {
        if !(value >= 0.) || value.is_infinite() {
            return Err(EfficiencyError::InvalidEntry { bin, value });
        }
    }
    if numerator > denominator {
        return Err(EfficiencyError::NumeratorExceedsDenominator {
            bin,
            numerator,
            denominator,
        });
    }
    Ok(())
}

/// Efficiency histogram computed from a numerator and a denominator
///
/// Bins are indexed like the input histograms, including under- and
/// overflow bins. The result is recomputed from scratch every time, so
/// it can be produced at any point during accumulation.
#[derive(Clone, Debug)]
pub struct Efficiency<A> {
    axes: A,
    bins: Vec<EfficiencyBin>,
}

impl<A: Axis + Clone + PartialEq> Efficiency<A> {
    pub fn new<H>(numerator: &H, denominator: &H) -> Result<Self, EfficiencyError>
    where
        H: Histogram<A, f64>,
    {
        check_binning(numerator.axes(), denominator.axes()).map_err(|err| {
            EfficiencyError::BinningMismatch {
                numerator: err.left,
                denominator: err.right,
            }
        })?;
        let bins = numerator
            .values()
            .zip(denominator.values())
            .enumerate()
            .map(|(bin, (&n, &d))| {
                validate(bin, n, d)?;
                Ok(EfficiencyBin::new(n, d))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            axes: numerator.axes().clone(),
            bins,
        })
    }

    pub fn axes(&self) -> &A {
        &self.axes
    }

    pub fn bins(&self) -> &[EfficiencyBin] {
        &self.bins
    }

    /// Efficiencies in percent as a histogram
    pub fn efficiencies(&self) -> VecHistogram<A, f64> {
        self.to_histogram(|b| b.efficiency)
    }

    /// Errors in percent as a histogram
    pub fn errors(&self) -> VecHistogram<A, f64> {
        self.to_histogram(|b| b.error)
    }

    fn to_histogram<F>(&self, value: F) -> VecHistogram<A, f64>
    where
        F: Fn(&EfficiencyBin) -> f64,
    {
        let mut hist = VecHistogram::new(self.axes.clone());
        for (v, bin) in hist.values_mut().zip(&self.bins) {
            *v = value(bin);
        }
        hist
    }
}

pub type Efficiency1D = Efficiency<AxesTuple<(Uniform<f64>,)>>;
pub type Efficiency2D = Efficiency<AxesTuple<(Uniform<f64>, Uniform<f64>)>>;

impl Efficiency1D {
    /// Suggested y-axis range for drawing
    pub fn display_range(&self) -> (f64, f64) {
        DISPLAY_RANGE
    }
}
