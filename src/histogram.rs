use std::f64::consts::{PI, TAU};

use ndhistogram::axis::{Axis, Uniform};
use ndhistogram::{ndhistogram, Histogram, VecHistogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One-dimensional histogram with uniform binning
pub type Hist1D = ndhistogram::Hist1D<Uniform<f64>, f64>;
/// Two-dimensional histogram with uniform binning
pub type Hist2D = ndhistogram::Hist2D<Uniform<f64>, Uniform<f64>, f64>;

/// Uniform binning of a single axis
///
/// At least one bin is required and the range must be finite with
/// `low < high`.
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
#[serde(try_from = "UncheckedBinning")]
pub struct Binning {
    nbins: usize,
    low: f64,
    high: f64,
}

#[derive(Deserialize)]
struct UncheckedBinning {
    nbins: usize,
    low: f64,
    high: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum InvalidBinning {
    #[error("Binning needs at least one bin")]
    NoBins,
    #[error("Invalid binning range [{low}, {high})")]
    Range { low: f64, high: f64 },
}

impl Binning {
    pub(crate) const fn new(nbins: usize, low: f64, high: f64) -> Self {
        Self { nbins, low, high }
    }

    /// `nbins` uniform bins in [`low`, `high`)
    pub fn try_new(nbins: usize, low: f64, high: f64) -> Result<Self, InvalidBinning> {
        if nbins == 0 {
            return Err(InvalidBinning::NoBins);
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(InvalidBinning::Range { low, high });
        }
        Ok(Self::new(nbins, low, high))
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn axis(&self) -> Uniform<f64> {
        Uniform::new(self.nbins, self.low, self.high)
    }
}

impl TryFrom<UncheckedBinning> for Binning {
    type Error = InvalidBinning;

    fn try_from(b: UncheckedBinning) -> Result<Self, Self::Error> {
        Self::try_new(b.nbins, b.low, b.high)
    }
}

/// η binning of EM maps
pub const EM_ETA: Binning = Binning::new(50, -2.5, 2.5);
/// φ binning of EM maps
pub const EM_PHI: Binning = Binning::new(64, -PI, PI);
/// η binning of jet maps, covering the FCAL
pub const JET_ETA: Binning = Binning::new(98, -4.9, 4.9);
/// φ binning of jet maps in the L1Calo convention
pub const JET_PHI: Binning = Binning::new(64, 0., TAU);

pub fn hist1d(x: Binning) -> Hist1D {
    ndhistogram!(x.axis(); f64)
}

pub fn hist2d(x: Binning, y: Binning) -> Hist2D {
    ndhistogram!(x.axis(), y.axis(); f64)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("Cannot combine histograms with different binning ({left} and {right} bins)")]
pub struct BinningMismatch {
    pub left: usize,
    pub right: usize,
}

/// Require identical axes, including the bin edges
pub(crate) fn check_binning<A: Axis + PartialEq>(
    left: &A,
    right: &A,
) -> Result<(), BinningMismatch> {
    if left == right {
        Ok(())
    } else {
        Err(BinningMismatch {
            left: left.num_bins(),
            right: right.num_bins(),
        })
    }
}

/// Add the contents of `other` to `hist` bin by bin
///
/// Under- and overflow bins are included.
pub fn merge_into<A: Axis + PartialEq>(
    hist: &mut VecHistogram<A, f64>,
    other: &VecHistogram<A, f64>,
) -> Result<(), BinningMismatch> {
    check_binning(hist.axes(), other.axes())?;
    for (v, o) in hist.values_mut().zip(other.values()) {
        *v += *o;
    }
    Ok(())
}

/// Set all bins to zero
pub fn reset<A: Axis>(hist: &mut VecHistogram<A, f64>) {
    for v in hist.values_mut() {
        *v = 0.;
    }
}

/// Sum over all bins, including under- and overflow
pub fn entries<A: Axis>(hist: &VecHistogram<A, f64>) -> f64 {
    hist.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge() {
        let mut a = hist1d(Binning::new(4, 0., 4.));
        let mut b = hist1d(Binning::new(4, 0., 4.));
        a.fill(&0.5);
        b.fill(&0.5);
        b.fill(&3.5);
        b.fill(&10.);
        merge_into(&mut a, &b).unwrap();
        assert_eq!(a.value(&0.5), Some(&2.));
        assert_eq!(a.value(&3.5), Some(&1.));
        assert_eq!(a.value(&10.), Some(&1.));
        assert_eq!(entries(&a), 4.);

        reset(&mut a);
        assert_eq!(entries(&a), 0.);
    }

    #[test]
    fn mismatch() {
        let mut a = hist1d(Binning::new(4, 0., 4.));
        let b = hist1d(Binning::new(5, 0., 4.));
        assert_eq!(
            merge_into(&mut a, &b),
            Err(BinningMismatch { left: 6, right: 7 })
        );
    }

    #[test]
    fn edge_mismatch() {
        let mut a = hist1d(Binning::new(4, 0., 4.));
        let b = hist1d(Binning::new(4, 0., 400.));
        assert_eq!(
            merge_into(&mut a, &b),
            Err(BinningMismatch { left: 6, right: 6 })
        );
    }

    #[test]
    fn transposed() {
        let (x, y) = (Binning::new(10, 0., 10.), Binning::new(2, 0., 2.));
        let mut a = hist2d(x, y);
        let b = hist2d(y, x);
        assert!(merge_into(&mut a, &b).is_err());
    }

    #[test]
    fn invalid_binning() {
        assert_eq!(Binning::try_new(0, 0., 1.), Err(InvalidBinning::NoBins));
        assert!(Binning::try_new(10, 1., 1.).is_err());
        assert!(Binning::try_new(10, 2., 1.).is_err());
        assert!(Binning::try_new(10, 0., f64::INFINITY).is_err());
        assert_eq!(Binning::try_new(10, 0., 1.), Ok(Binning::new(10, 0., 1.)));

        let b: Binning = serde_yaml::from_str("{nbins: 3, low: 0, high: 30}").unwrap();
        assert_eq!(b.nbins(), 3);
        assert!(serde_yaml::from_str::<Binning>("{nbins: 3, low: 5, high: 5}").is_err());
    }

    #[test]
    fn two_dim() {
        let mut h = hist2d(EM_ETA, EM_PHI);
        h.fill(&(0.01, 0.01));
        h.fill_with(&(0.01, 0.01), 2.);
        assert_eq!(h.value(&(0.02, 0.02)), Some(&3.));
        assert_eq!(h.axes().num_bins(), 52 * 66);
    }
}
