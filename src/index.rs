//! Interval indexing for overlap queries against loop extents.

use crate::interval::{ranges_overlap, Interval};
use rustc_hash::FxHashMap;

/// Intervals of interest partitioned by chromosome.
///
/// Each chromosome's intervals are sorted by start so a query only scans the
/// intervals starting at or before the query end. Queries use closed
/// boundaries: touching endpoints count as overlapping.
pub struct IntervalIndex {
    /// (start, end, original index), sorted by start
    by_chrom: FxHashMap<String, Vec<(u64, u64, usize)>>,
    len: usize,
}

impl IntervalIndex {
    /// Build an index, remembering each interval's position in `intervals`.
    pub fn from_intervals(intervals: &[Interval]) -> Self {
        let mut by_chrom: FxHashMap<String, Vec<(u64, u64, usize)>> = FxHashMap::default();

        for (idx, interval) in intervals.iter().enumerate() {
            by_chrom
                .entry(interval.chrom.clone())
                .or_default()
                .push((interval.start, interval.end, idx));
        }

        for entries in by_chrom.values_mut() {
            entries.sort_unstable();
        }

        Self {
            by_chrom,
            len: intervals.len(),
        }
    }

    /// Indices of every interval overlapping `query`, ascending.
    pub fn find_overlap_indices(&self, query: &Interval) -> Vec<usize> {
        let mut results: Vec<usize> = self.overlapping(query).map(|(_, _, idx)| *idx).collect();
        results.sort_unstable();
        results
    }

    /// Check if any interval overlaps `query`.
    pub fn has_overlap(&self, query: &Interval) -> bool {
        self.overlapping(query).next().is_some()
    }

    /// Entries on the query chromosome overlapping it with closed boundaries.
    ///
    /// Only entries starting at or before `query.end` can overlap, so the scan
    /// stops there.
    fn overlapping<'a>(
        &'a self,
        query: &'a Interval,
    ) -> impl Iterator<Item = &'a (u64, u64, usize)> + 'a {
        let entries = match self.by_chrom.get(&query.chrom) {
            Some(entries) => {
                let upper = entries.partition_point(|(iv_start, _, _)| *iv_start <= query.end);
                &entries[..upper]
            }
            None => &[][..],
        };
        entries.iter().filter(move |(iv_start, iv_end, _)| {
            ranges_overlap(query.start, query.end, *iv_start, *iv_end)
        })
    }

    /// Number of chromosomes with at least one interval.
    pub fn num_chromosomes(&self) -> usize {
        self.by_chrom.len()
    }

    /// Total number of indexed intervals.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
