//! Chromosome region table.
//!
//! Parses region files (delimited: chrom, start, length). Two-column
//! `.genome` style files (chrom, length) are accepted with start 0.

use rustc_hash::FxHashMap;
use std::io::Read;
use std::path::Path;

use crate::error::{LoopError, Result};
use crate::table::TableReader;

/// Coordinate bounds for one chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeRegion {
    pub chrom: String,
    pub start: u64,
    /// Usable coordinate upper bound for the chromosome.
    pub length: u64,
}

/// Chromosome regions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeTable {
    regions: Vec<ChromosomeRegion>,
    /// Chromosome name to position in `regions`
    ranks: FxHashMap<String, usize>,
}

impl ChromosomeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a file, detecting its delimiter.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_table(TableReader::from_path(path)?)
    }

    /// Parse a table from a string (useful for testing).
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_table(TableReader::new(content.as_bytes()))
    }

    /// Load a table from any table reader.
    pub fn from_table<R: Read>(mut reader: TableReader<R>) -> Result<Self> {
        let mut table = Self::new();

        while let Some(row) = reader.read_row()? {
            let (start, length) = match row.fields.len() {
                0 | 1 => {
                    return Err(LoopError::Parse {
                        line: row.line,
                        message:
                            "Chromosome region file requires columns: chrom, start, length"
                                .to_string(),
                    })
                }
                2 => (0, row.position(1, "length")?),
                _ => (row.position(1, "start")?, row.position(2, "length")?),
            };
            table.insert(row.text(0, "chrom")?, start, length);
        }

        Ok(table)
    }

    /// Insert a region (appends to the order if new, replaces otherwise).
    pub fn insert(&mut self, chrom: impl Into<String>, start: u64, length: u64) {
        let chrom = chrom.into();
        let region = ChromosomeRegion {
            chrom: chrom.clone(),
            start,
            length,
        };
        match self.ranks.get(&chrom) {
            Some(&idx) => self.regions[idx] = region,
            None => {
                self.ranks.insert(chrom, self.regions.len());
                self.regions.push(region);
            }
        }
    }

    /// Position of a chromosome in declaration order.
    #[inline]
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.ranks.get(chrom).copied()
    }

    /// Length of a chromosome.
    #[inline]
    pub fn length(&self, chrom: &str) -> Option<u64> {
        self.region(chrom).map(|r| r.length)
    }

    pub fn region(&self, chrom: &str) -> Option<&ChromosomeRegion> {
        self.rank(chrom).map(|idx| &self.regions[idx])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
