use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

/// The seed is drawn from this many of the slowest candidates.
pub const SEED_BAND_SIZE: usize = 10;
/// A next track must be strictly faster than the current one by more than this...
pub const MIN_STEP_BPM: f64 = 2.5;
/// ...and by less than this.
pub const MAX_STEP_BPM: f64 = 7.0;
/// The walk stops once the current tempo is within this much of the fastest candidate.
pub const HEADROOM_BPM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Ascending,
    Descending,
}

/// Uniform choice among `n` options.
pub trait RandomSource {
    /// An index in `0..n`. Callers never pass `n == 0`.
    fn pick(&mut self, n: usize) -> usize;
}

/// [`RandomSource`] seeded once from OS entropy.
pub struct EntropyRandom {
    rng: fastrand::Rng,
}

impl EntropyRandom {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Default for EntropyRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropyRandom {
    fn pick(&mut self, n: usize) -> usize {
        self.rng.usize(..n)
    }
}

/// One banded walk, in play order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSequence {
    pub pattern: Pattern,
    pub tracks: Vec<(String, u32)>,
}

impl GeneratedSequence {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Build one randomized BPM-banded walk over `candidates`.
///
/// The walk starts from a random pick among the [`SEED_BAND_SIZE`] slowest
/// candidates (all of them when there are fewer), then repeatedly appends a
/// random unused candidate whose tempo lies strictly between
/// `current + MIN_STEP_BPM` and `current + MAX_STEP_BPM`. It ends when the
/// current tempo plus [`HEADROOM_BPM`] exceeds the fastest candidate or when
/// no candidate fits the band. `Descending` reverses the finished walk; every
/// call performs its own walk.
pub fn generate(
    candidates: &Catalog,
    pattern: Pattern,
    rng: &mut dyn RandomSource,
) -> GeneratedSequence {
    // Catalog iterates by path, so ties in tempo keep a stable order
    let mut sorted: Vec<(&str, u32)> = candidates
        .iter()
        .map(|(p, b)| (p.as_str(), *b))
        .collect();
    sorted.sort_by_key(|(_, bpm)| *bpm);

    let Some(&(_, limit_bpm)) = sorted.last() else {
        return GeneratedSequence {
            pattern,
            tracks: Vec::new(),
        };
    };
    let limit_bpm = limit_bpm as f64;

    let seed_band = &sorted[..sorted.len().min(SEED_BAND_SIZE)];
    let (seed_path, seed_bpm) = seed_band[rng.pick(seed_band.len())];

    let mut tracks = vec![(seed_path.to_string(), seed_bpm)];
    let mut used: HashSet<&str> = HashSet::from([seed_path]);

    loop {
        let current_bpm = tracks.last().map(|(_, b)| *b as f64).unwrap_or(limit_bpm);
        if current_bpm + HEADROOM_BPM > limit_bpm {
            break;
        }

        let lower = current_bpm + MIN_STEP_BPM;
        let upper = current_bpm + MAX_STEP_BPM;
        let band: Vec<(&str, u32)> = sorted
            .iter()
            .copied()
            .filter(|(p, b)| lower < *b as f64 && (*b as f64) < upper && !used.contains(p))
            .collect();
        if band.is_empty() {
            break;
        }

        let (path, bpm) = band[rng.pick(band.len())];
        used.insert(path);
        tracks.push((path.to_string(), bpm));
    }

    if pattern == Pattern::Descending {
        tracks.reverse();
    }

    log::debug!(
        "Generated {:?} walk of {} tracks ({} -> {} BPM)",
        pattern,
        tracks.len(),
        tracks.first().map(|(_, b)| *b).unwrap_or(0),
        tracks.last().map(|(_, b)| *b).unwrap_or(0)
    );

    GeneratedSequence { pattern, tracks }
}

/// Several walks folded into one flat ordering.
///
/// Merging behaves like an insertion-ordered map update: a path seen before
/// keeps its first position and takes the newer BPM; new paths are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSequence {
    entries: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl MergedSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, sequence: &GeneratedSequence) {
        for (path, bpm) in &sequence.tracks {
            self.insert(path.clone(), *bpm);
        }
    }

    pub fn insert(&mut self, path: String, bpm: u32) {
        match self.index.get(&path) {
            Some(&i) => self.entries[i].1 = bpm,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, bpm));
            }
        }
    }

    pub fn entries(&self) -> &[(String, u32)] {
        &self.entries
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, u32)> for MergedSequence {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        let mut merged = Self::new();
        for (path, bpm) in iter {
            merged.insert(path, bpm);
        }
        merged
    }
}
