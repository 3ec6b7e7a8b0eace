//! ABOUTME: Bounded per-pool sample history
//! ABOUTME: FIFO eviction past the point limit and one-shot seeding of empty series

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use crate::sample::Sample;

/// Time-ordered samples keyed by pool name
///
/// Series are created on first write and live as long as the history does,
/// so reconnecting to a pool resumes with its earlier samples visible.
#[derive(Debug)]
pub struct History {
    max_points: usize,
    series: DashMap<String, VecDeque<Sample>>,
}

impl History {
    /// Create an empty history holding at most `max_points` samples per key
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            series: DashMap::new(),
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Append in arrival order, evicting the oldest sample past the bound
    pub fn append(&self, key: &str, sample: Sample) {
        let mut points = self.series.entry(key.to_string()).or_default();
        if points.len() >= self.max_points {
            points.pop_front();
        }
        points.push_back(sample);
    }

    /// Copy of the series for `key`, oldest first; empty for unknown keys
    pub fn read(&self, key: &str) -> Vec<Sample> {
        self.series
            .get(key)
            .map(|points| points.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recent sample for `key`
    pub fn latest(&self, key: &str) -> Option<Sample> {
        self.series.get(key).and_then(|points| points.back().copied())
    }

    pub fn len(&self, key: &str) -> usize {
        self.series.get(key).map(|points| points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Keys that have ever received samples
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.series.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Backfill an empty series with historical samples
    ///
    /// Does nothing if the series already holds samples, so a late seed
    /// response never clobbers live data. Only the most recent
    /// `max_points` samples are kept. Returns whether the seed was applied.
    pub fn seed(&self, key: &str, samples: Vec<Sample>) -> bool {
        if samples.is_empty() {
            return false;
        }

        let skip = samples.len().saturating_sub(self.max_points);
        let seeded = samples.into_iter().skip(skip);

        // checked and filled under the same shard lock
        match self.series.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_empty() {
                    debug!(key = %key, "Ignoring seed for series that already has samples");
                    return false;
                }
                entry.get_mut().extend(seeded);
                debug!(key = %key, points = entry.get().len(), "Seeded history");
            }
            Entry::Vacant(entry) => {
                let points = entry.insert(seeded.collect());
                debug!(key = %key, points = points.len(), "Seeded history");
            }
        }
        true
    }
}
