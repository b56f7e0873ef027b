//! Reward table lookup.
//!
//! A reward table is a list of `[min, max]` offset bands, each worth a fixed
//! reward. `max = None` means the band is open-ended. An offset that falls in
//! a gap between bands scores `0`.

use serde::{Deserialize, Serialize};

/// One scoring band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBand {
    pub min: u32,
    /// Inclusive upper bound; `None` is infinity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    pub reward: u32,
}

impl RewardBand {
    pub const fn new(min: u32, max: Option<u32>, reward: u32) -> Self {
        Self { min, max, reward }
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.min && self.max.map_or(true, |max| offset <= max)
    }
}

/// Bands used when no (or an empty) table is configured.
pub const DEFAULT_BANDS: [RewardBand; 5] = [
    RewardBand::new(0, Some(0), 33),
    RewardBand::new(1, Some(10), 15),
    RewardBand::new(11, Some(50), 10),
    RewardBand::new(51, Some(100), 5),
    RewardBand::new(101, None, 3),
];

pub fn default_bands() -> Vec<RewardBand> {
    DEFAULT_BANDS.to_vec()
}

/// Resolve the reward for `offset`.
///
/// `None` or an empty slice falls back to [`DEFAULT_BANDS`]. Bands are
/// matched in ascending `min` order; the first containing band wins.
pub fn resolve_reward(offset: u32, bands: Option<&[RewardBand]>) -> u32 {
    match bands {
        Some(bands) if !bands.is_empty() => {
            let mut sorted = bands.to_vec();
            sorted.sort_by_key(|b| b.min);
            first_match(&sorted, offset)
        }
        _ => first_match(&DEFAULT_BANDS, offset),
    }
}

fn first_match(sorted: &[RewardBand], offset: u32) -> u32 {
    sorted
        .iter()
        .find(|band| band.contains(offset))
        .map(|band| band.reward)
        .unwrap_or(0)
}

/// An uncovered offset range, reported by [`RewardTable::gaps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandGap {
    pub from: u32,
    /// Inclusive; `None` means everything from `from` upward is uncovered.
    pub to: Option<u32>,
}

/// A sorted reward table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTable {
    bands: Vec<RewardBand>,
    is_default: bool,
}

impl RewardTable {
    /// Build a table; empty input yields the default table.
    pub fn new(bands: &[RewardBand]) -> Self {
        if bands.is_empty() {
            return Self::default();
        }
        let mut bands = bands.to_vec();
        bands.sort_by_key(|b| b.min);
        Self {
            bands,
            is_default: false,
        }
    }

    pub fn bands(&self) -> &[RewardBand] {
        &self.bands
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn resolve(&self, offset: u32) -> u32 {
        first_match(&self.bands, offset)
    }

    /// Offset ranges no band covers. These resolve to a reward of `0`.
    pub fn gaps(&self) -> Vec<BandGap> {
        let mut gaps = Vec::new();
        // Next offset not yet known to be covered; `None` once coverage reaches infinity.
        let mut next: Option<u32> = Some(0);
        for band in &self.bands {
            let Some(start) = next else { break };
            if band.min > start {
                gaps.push(BandGap {
                    from: start,
                    to: Some(band.min - 1),
                });
            }
            next = match band.max {
                None => None,
                Some(max) if max >= start => max.checked_add(1),
                Some(_) => Some(start),
            };
        }
        if let Some(start) = next {
            gaps.push(BandGap {
                from: start,
                to: None,
            });
        }
        gaps
    }

    /// Pairs of bands whose ranges intersect. Only the first one ever scores.
    pub fn overlaps(&self) -> Vec<(RewardBand, RewardBand)> {
        let mut found = Vec::new();
        for (i, a) in self.bands.iter().enumerate() {
            for b in &self.bands[i + 1..] {
                if a.max.map_or(true, |max| b.min <= max) {
                    found.push((*a, *b));
                }
            }
        }
        found
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            is_default: true,
        }
    }
}
