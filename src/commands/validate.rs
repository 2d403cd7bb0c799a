//! Validate command implementation.
//!
//! Sorts a loop set into chromosome-table order and applies the per-row
//! rules, in this order. Rows whose chromosome is missing from the region
//! table are dropped before any rule runs.
//!
//! 1. anchor sizes differ → warning
//! 2. first anchor has start >= end → warning
//! 3. second anchor has start >= end → warning
//! 4. anchors overlap (`end1 >= start2`) → warning
//!
//! Only rows that raised none of the warnings above go through the
//! corrective rules:
//!
//! 5. second anchor lies before the first → anchors are swapped
//! 6. anchors on different chromosomes → row removed
//! 7. either anchor `>= flag_end_size` → row removed
//!
//! A row that only raised warnings is kept as is.

use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::path::Path;

use log::{info, warn};

use crate::config::OutputConfig;
use crate::error::Result;
use crate::genome::ChromosomeTable;
use crate::interval::LoopRecord;
use crate::table::{read_loops_from, write_loops, TableReader};

/// Default anchor size at which rows are removed.
pub const DEFAULT_FLAG_END_SIZE: u64 = 100_000;

/// A non-fatal condition found on one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    AnchorSizeMismatch { first: i64, second: i64 },
    FirstAnchorInverted { start: u64, end: u64 },
    SecondAnchorInverted { start: u64, end: u64 },
    AnchorsOverlap { end1: u64, start2: u64 },
    AnchorsSwapped,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorSizeMismatch { first, second } => write!(
                f,
                "sizes of first and second end of loop differ ({} != {})",
                first, second
            ),
            Self::FirstAnchorInverted { start, end } => write!(
                f,
                "first end of loop has start >= end ({} >= {})",
                start, end
            ),
            Self::SecondAnchorInverted { start, end } => write!(
                f,
                "second end of loop has start >= end ({} >= {})",
                start, end
            ),
            Self::AnchorsOverlap { end1, start2 } => write!(
                f,
                "first and second end of loop overlap ({} >= {})",
                end1, start2
            ),
            Self::AnchorsSwapped => {
                write!(f, "second end of loop comes before first end; swapped ends")
            }
        }
    }
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    UnknownChromosome { chrom: String },
    InterChromosomal { chrom1: String, chrom2: String },
    FirstAnchorTooLarge { size: i64 },
    SecondAnchorTooLarge { size: i64 },
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChromosome { chrom } => {
                write!(f, "chromosome {} is not in the chromosome region table", chrom)
            }
            Self::InterChromosomal { chrom1, chrom2 } => {
                write!(f, "long-distance loop ({} != {})", chrom1, chrom2)
            }
            Self::FirstAnchorTooLarge { size } => write!(f, "first end of loop is {} bp", size),
            Self::SecondAnchorTooLarge { size } => write!(f, "second end of loop is {} bp", size),
        }
    }
}

/// A warning attached to its row (1-based, in sorted order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    pub row: usize,
    pub warning: ValidationWarning,
}

/// A removed row (1-based, in sorted order) and every reason that applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedRow {
    pub row: usize,
    pub record: LoopRecord,
    pub reasons: Vec<RemovalReason>,
}

/// Cleaned loop set plus the diagnostics produced while building it.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub loops: Vec<LoopRecord>,
    pub warnings: Vec<RowWarning>,
    pub removed: Vec<RemovedRow>,
}

impl ValidationReport {
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loops kept, {} removed, {} warnings",
            self.loops.len(),
            self.removed.len(),
            self.warnings.len()
        )
    }
}

/// Validate command configuration.
#[derive(Debug, Clone)]
pub struct ValidateCommand {
    pub flag_end_size: u64,
}

impl Default for ValidateCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidateCommand {
    pub fn new() -> Self {
        Self {
            flag_end_size: DEFAULT_FLAG_END_SIZE,
        }
    }

    pub fn with_flag_end_size(mut self, flag_end_size: u64) -> Self {
        self.flag_end_size = flag_end_size;
        self
    }

    /// Read, validate and write a loop table.
    pub fn run<R: Read, P: AsRef<Path>>(
        &self,
        input: TableReader<R>,
        loop_out: P,
        chromosomes: &ChromosomeTable,
        output: OutputConfig,
    ) -> Result<ValidationReport> {
        let loops = read_loops_from(input)?;
        info!("Validating {} loops", loops.len());

        let report = self.validate(&loops, chromosomes);
        write_loops(loop_out.as_ref(), &report.loops, output)?;

        info!(
            "{} loops written to {}",
            report.loops.len(),
            loop_out.as_ref().display()
        );
        Ok(report)
    }

    /// Sort and validate a loop set. The input is left untouched.
    pub fn validate(&self, loops: &[LoopRecord], chromosomes: &ChromosomeTable) -> ValidationReport {
        let mut report = ValidationReport::default();
        let sorted = sort_loops(loops, chromosomes);

        report.loops.reserve(sorted.len());
        for (i, mut record) in sorted.into_iter().enumerate() {
            let row = i + 1;
            if chromosomes.rank(record.chrom1()).is_none() {
                let reason = RemovalReason::UnknownChromosome {
                    chrom: record.chrom1().to_string(),
                };
                warn!("{} on row {}; removing row", reason, row);
                report.removed.push(RemovedRow {
                    row,
                    record,
                    reasons: vec![reason],
                });
                continue;
            }

            let mut push_warning = |warning: ValidationWarning| {
                warn!("{} on row {}", warning, row);
                report.warnings.push(RowWarning { row, warning });
            };

            let first = record.anchor1_size();
            let second = record.anchor2_size();
            let mut structural = false;

            // 1
            if first != second {
                push_warning(ValidationWarning::AnchorSizeMismatch { first, second });
                structural = true;
            }
            // 2
            if record.start1() >= record.end1() {
                push_warning(ValidationWarning::FirstAnchorInverted {
                    start: record.start1(),
                    end: record.end1(),
                });
                structural = true;
            }
            // 3
            if record.start2() >= record.end2() {
                push_warning(ValidationWarning::SecondAnchorInverted {
                    start: record.start2(),
                    end: record.end2(),
                });
                structural = true;
            }
            // 4
            if record.end1() >= record.start2() {
                push_warning(ValidationWarning::AnchorsOverlap {
                    end1: record.end1(),
                    start2: record.start2(),
                });
                structural = true;
            }

            if structural {
                report.loops.push(record);
                continue;
            }

            // 5
            if record.end2() < record.start1() {
                push_warning(ValidationWarning::AnchorsSwapped);
                record.swap_anchors();
            }

            let mut reasons = Vec::new();
            // 6
            if record.chrom1() != record.chrom2() {
                reasons.push(RemovalReason::InterChromosomal {
                    chrom1: record.chrom1().to_string(),
                    chrom2: record.chrom2().to_string(),
                });
            }
            // 7
            let too_large = |size: i64| size >= 0 && size as u64 >= self.flag_end_size;
            if too_large(first) {
                reasons.push(RemovalReason::FirstAnchorTooLarge { size: first });
            }
            if too_large(second) {
                reasons.push(RemovalReason::SecondAnchorTooLarge { size: second });
            }

            if reasons.is_empty() {
                report.loops.push(record);
            } else {
                for reason in &reasons {
                    warn!("{} on row {}; removing row", reason, row);
                }
                report.removed.push(RemovedRow {
                    row,
                    record,
                    reasons,
                });
            }
        }

        if !report.removed.is_empty() {
            info!("Removed {} loops during validation", report.removed.len());
        }
        report
    }
}

/// Sort by (chromosome rank in the table, start1, end1).
///
/// Chromosomes missing from the table sort after all declared ones, by name.
/// The sort is stable, so already-sorted input keeps its order.
fn sort_loops(loops: &[LoopRecord], chromosomes: &ChromosomeTable) -> Vec<LoopRecord> {
    let mut keyed: Vec<(Option<usize>, &LoopRecord)> = loops
        .iter()
        .map(|lp| (chromosomes.rank(lp.chrom1()), lp))
        .collect();

    keyed.sort_by(|(rank_a, a), (rank_b, b)| {
        let by_chrom = match (rank_a, rank_b) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.chrom1().cmp(b.chrom1()),
        };
        by_chrom
            .then(a.start1().cmp(&b.start1()))
            .then(a.end1().cmp(&b.end1()))
    });

    keyed.into_iter().map(|(_, lp)| lp.clone()).collect()
}
