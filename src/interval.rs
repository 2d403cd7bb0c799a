//! Core genomic types: intervals of interest and chromatin loops.

use std::fmt;

/// A genomic interval with chromosome, start, and end positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Interval {
    /// Create a new interval.
    #[inline]
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    /// Signed length; zero or negative for inverted anchors.
    #[inline]
    pub fn size(&self) -> i64 {
        self.end as i64 - self.start as i64
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.chrom, self.start, self.end)
    }
}

/// Do two ranges overlap? Shared boundaries count as overlapping.
#[inline]
pub fn ranges_overlap(x_start: u64, x_end: u64, y_start: u64, y_end: u64) -> bool {
    x_start <= y_end && y_start <= x_end
}

/// One chromatin loop: two anchors believed to be in physical contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopRecord {
    pub anchor1: Interval,
    pub anchor2: Interval,
}

impl LoopRecord {
    /// Create a loop from its six columns.
    pub fn new(
        chrom1: impl Into<String>,
        start1: u64,
        end1: u64,
        chrom2: impl Into<String>,
        start2: u64,
        end2: u64,
    ) -> Self {
        Self {
            anchor1: Interval::new(chrom1, start1, end1),
            anchor2: Interval::new(chrom2, start2, end2),
        }
    }

    /// Build an intra-chromosomal loop from two anchor ranges.
    pub fn intra(chrom: &str, start1: u64, end1: u64, start2: u64, end2: u64) -> Self {
        Self::new(chrom, start1, end1, chrom, start2, end2)
    }

    #[inline]
    pub fn chrom1(&self) -> &str {
        &self.anchor1.chrom
    }

    #[inline]
    pub fn chrom2(&self) -> &str {
        &self.anchor2.chrom
    }

    #[inline]
    pub fn start1(&self) -> u64 {
        self.anchor1.start
    }

    #[inline]
    pub fn end1(&self) -> u64 {
        self.anchor1.end
    }

    #[inline]
    pub fn start2(&self) -> u64 {
        self.anchor2.start
    }

    #[inline]
    pub fn end2(&self) -> u64 {
        self.anchor2.end
    }

    /// Size of the first anchor (`end1 - start1`).
    #[inline]
    pub fn anchor1_size(&self) -> i64 {
        self.anchor1.size()
    }

    /// Size of the second anchor (`end2 - start2`).
    #[inline]
    pub fn anchor2_size(&self) -> i64 {
        self.anchor2.size()
    }

    /// Distance between anchor starts (`start2 - start1`).
    #[inline]
    pub fn separation(&self) -> i64 {
        self.start2() as i64 - self.start1() as i64
    }

    /// Outer span of the loop, from the first anchor's start to the second anchor's end.
    ///
    /// The gap between the anchors is part of the extent.
    #[inline]
    pub fn extent(&self) -> Interval {
        Interval::new(self.anchor1.chrom.clone(), self.start1(), self.end2())
    }

    /// Swap the two anchors in place.
    pub fn swap_anchors(&mut self) {
        std::mem::swap(&mut self.anchor1, &mut self.anchor2);
    }
}

impl fmt::Display for LoopRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.anchor1, self.anchor2)
    }
}
