use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bits in an RoI threshold word
pub const ROI_BITS: usize = 32;

/// First bit of forward jet thresholds in a jet RoI word
pub const FORWARD_JET_FIRST_BIT: usize = 8;

/// A trigger threshold with its position in the RoI word
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Threshold {
    pub bit: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("Threshold bit {0} out of range for a 32 bit RoI word")]
    BitOutOfRange(usize),
    #[error("Threshold bit {bit} assigned to both {first} and {second}")]
    DuplicateBit {
        bit: usize,
        first: String,
        second: String,
    },
}

/// Table of trigger thresholds, resolved once at startup
///
/// Maps bits of an RoI word to threshold labels such as `EM10` or
/// `FJ20`. The table is supplied by the caller, as it depends on the
/// trigger menu in use.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(try_from = "Vec<Threshold>", into = "Vec<Threshold>")]
pub struct ThresholdMenu {
    labels: Vec<Option<String>>,
}

impl ThresholdMenu {
    /// Build a table from (bit, label) pairs
    pub fn new<I, S>(thresholds: I) -> Result<Self, ThresholdError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut labels = vec![None; ROI_BITS];
        for (bit, label) in thresholds {
            let label = label.into();
            let slot = labels
                .get_mut(bit)
                .ok_or(ThresholdError::BitOutOfRange(bit))?;
            if let Some(first) = slot.take() {
                return Err(ThresholdError::DuplicateBit {
                    bit,
                    first,
                    second: label,
                });
            }
            *slot = Some(label);
        }
        Ok(Self { labels })
    }

    /// Label of the threshold at `bit`
    pub fn label(&self, bit: usize) -> Option<&str> {
        self.labels.get(bit).and_then(|l| l.as_deref())
    }

    /// All configured thresholds in bit order
    pub fn thresholds(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(bit, l)| l.as_deref().map(|l| (bit, l)))
    }

    /// Labels of all thresholds set in `roi_word`
    pub fn passed<'a>(
        &'a self,
        roi_word: u32,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.thresholds()
            .filter(move |(bit, _)| is_set(roi_word, *bit))
            .map(|(_, l)| l)
    }

    /// Bit mask of all thresholds whose label contains `category`
    pub fn category_mask(&self, category: &str) -> u32 {
        self.thresholds()
            .filter(|(_, l)| l.contains(category))
            .fold(0, |mask, (bit, _)| mask | (1 << bit))
    }

    /// Link forward jet thresholds to central jet thresholds
    ///
    /// The returned vector has one entry per forward jet bit starting at
    /// [FORWARD_JET_FIRST_BIT]. Each entry is the central jet bit with
    /// the same threshold value, e.g. `FJ20` is linked to `J20`.
    /// Thresholds without partner are linked to bit 0.
    pub fn forward_jet_links(&self, nforward: usize) -> Vec<usize> {
        let mut links = Vec::with_capacity(nforward);
        let mut nlinked = 0;
        for k in 0..nforward {
            let fbit = FORWARD_JET_FIRST_BIT + k;
            let partner = self
                .label(fbit)
                .and_then(|l| l.strip_prefix("FJ"))
                .and_then(|value| {
                    (0..FORWARD_JET_FIRST_BIT).find(|&bit| {
                        self.label(bit)
                            .and_then(|l| l.strip_prefix('J'))
                            .is_some_and(|v| v == value)
                    })
                });
            if let Some(bit) = partner {
                debug!("Linking forward jet bit {fbit} to jet bit {bit}");
                nlinked += 1;
            }
            links.push(partner.unwrap_or(0));
        }
        if nlinked != nforward {
            warn!("Jet ForwardJet mismatch: linked {nlinked} of {nforward} thresholds");
        }
        links
    }
}

impl TryFrom<Vec<Threshold>> for ThresholdMenu {
    type Error = ThresholdError;

    fn try_from(thresholds: Vec<Threshold>) -> Result<Self, Self::Error> {
        Self::new(thresholds.into_iter().map(|t| (t.bit, t.label)))
    }
}

impl From<ThresholdMenu> for Vec<Threshold> {
    fn from(menu: ThresholdMenu) -> Self {
        menu.thresholds()
            .map(|(bit, label)| Threshold {
                bit,
                label: label.to_owned(),
            })
            .collect()
    }
}

/// Whether `bit` is set in `word`
pub fn is_set(word: u32, bit: usize) -> bool {
    bit < ROI_BITS && (word >> bit) & 1 == 1
}
