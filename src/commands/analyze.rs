//! Analyze command implementation.
//!
//! Computes the overlap ratio of a loop set against intervals of interest:
//! the fraction of loops whose extent (`start1..=end2`) touches at least one
//! interval. The same computation scores the real loops and every simulated
//! set.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rayon::prelude::*;

use crate::config::{Delimiter, OutputConfig};
use crate::error::{LoopError, Result};
use crate::index::IntervalIndex;
use crate::interval::LoopRecord;
use crate::parallel::build_pool;
use crate::table::{open_table, read_loops_from, write_ratios, TableWriter};

/// Ratio plus the overlapping interval indices for every row.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapResult {
    pub ratio: f64,
    /// Per row, indices into the interval list (empty when nothing overlaps).
    pub overlaps: Vec<Vec<usize>>,
}

impl OverlapResult {
    /// Number of rows with at least one overlapping interval.
    pub fn hits(&self) -> usize {
        self.overlaps.iter().filter(|o| !o.is_empty()).count()
    }
}

/// Fraction of loops whose extent overlaps at least one indexed interval.
pub fn overlap_ratio(loops: &[LoopRecord], index: &IntervalIndex) -> Result<f64> {
    if loops.is_empty() {
        return Err(LoopError::EmptyLoopSet);
    }
    let hits = loops
        .iter()
        .filter(|lp| index.has_overlap(&lp.extent()))
        .count();
    Ok(hits as f64 / loops.len() as f64)
}

/// Overlap ratio with per-row annotations.
pub fn annotate_overlaps(loops: &[LoopRecord], index: &IntervalIndex) -> Result<OverlapResult> {
    if loops.is_empty() {
        return Err(LoopError::EmptyLoopSet);
    }
    let overlaps: Vec<Vec<usize>> = loops
        .iter()
        .map(|lp| index.find_overlap_indices(&lp.extent()))
        .collect();
    let hits = overlaps.iter().filter(|o| !o.is_empty()).count();

    Ok(OverlapResult {
        ratio: hits as f64 / loops.len() as f64,
        overlaps,
    })
}

/// Statistics from a batch analysis.
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    pub files: usize,
    pub mean_ratio: f64,
}

/// Analyze command configuration.
#[derive(Debug, Clone)]
pub struct AnalyzeCommand {
    /// Fixed delimiter for loop files read in batch mode (detected when unset).
    pub input: Option<Delimiter>,
    pub output: OutputConfig,
}

impl Default for AnalyzeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzeCommand {
    pub fn new() -> Self {
        Self {
            input: None,
            output: OutputConfig::default(),
        }
    }

    pub fn with_input_delimiter(mut self, delimiter: Option<Delimiter>) -> Self {
        self.input = delimiter;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Write `loops` with a 7th column of overlapping interval indices.
    pub fn write_annotated<P: AsRef<Path>>(
        &self,
        loops: &[LoopRecord],
        result: &OverlapResult,
        path: P,
    ) -> Result<()> {
        let mut writer = TableWriter::create(path, self.output)?;
        for (lp, overlaps) in loops.iter().zip(&result.overlaps) {
            writer.write_annotated(lp, overlaps)?;
        }
        writer.flush()
    }

    /// Annotate one loop set and return its ratio.
    ///
    /// The annotated table is written only when `annotated_out` is given.
    pub fn run(
        &self,
        loops: &[LoopRecord],
        index: &IntervalIndex,
        annotated_out: Option<&Path>,
    ) -> Result<f64> {
        let result = annotate_overlaps(loops, index)?;
        info!(
            "{} of {} loops overlap an interval of interest",
            result.hits(),
            loops.len()
        );
        if let Some(path) = annotated_out {
            self.write_annotated(loops, &result, path)?;
        }
        Ok(result.ratio)
    }

    /// Compute one ratio per loop file in `dir`, in file name order.
    ///
    /// Writes the ratios to `ratio_out`, one per line. When `loop_out_dir` is
    /// set, file `i` is also written annotated as `summary_table_{i}.loop`.
    pub fn run_batch(
        &self,
        dir: &Path,
        index: &IntervalIndex,
        ratio_out: &Path,
        loop_out_dir: Option<&Path>,
        workers: usize,
    ) -> Result<BatchStats> {
        let files = list_loop_files(dir)?;
        if files.is_empty() {
            return Err(LoopError::InvalidFormat(format!(
                "No loop files found in {}",
                dir.display()
            )));
        }
        if let Some(out) = loop_out_dir {
            fs::create_dir_all(out)?;
        }

        let pool = build_pool(workers)?;
        info!("Analyzing {} loop files", files.len());

        let ratios = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .map(|(i, path)| -> Result<f64> {
                    let loops = read_loops_from(open_table(path, self.input)?)?;
                    let annotated = loop_out_dir.map(|out| summary_path(out, i));
                    let ratio = self.run(&loops, index, annotated.as_deref())?;
                    debug!("{}: ratio {}", path.display(), ratio);
                    Ok(ratio)
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        write_ratios(ratio_out, &ratios)?;

        Ok(BatchStats {
            files: ratios.len(),
            mean_ratio: ratios.iter().sum::<f64>() / ratios.len() as f64,
        })
    }
}

/// Regular files in `dir`, sorted by name.
pub fn list_loop_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// File name used for annotated batch output `index`.
pub fn summary_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("summary_table_{}.loop", index))
}
