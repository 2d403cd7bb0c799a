//! Permute command implementation.
//!
//! Runs the whole permutation test in one pass: validate the real loops,
//! score them against the intervals of interest, simulate the null model,
//! score every simulated set, and summarize.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::info;

use crate::config::OutputConfig;
use crate::error::{LoopError, Result};
use crate::genome::ChromosomeTable;
use crate::index::IntervalIndex;
use crate::interval::{Interval, LoopRecord};
use crate::parallel::default_workers;
use crate::table::{write_loops, write_ratios};

use super::analyze::overlap_ratio;
use super::simulate::{simulation_path, SimulateCommand};
use super::stats::{summarize, DistributionStats};
use super::validate::{ValidateCommand, DEFAULT_FLAG_END_SIZE};

/// Outcome of a permutation test.
#[derive(Debug, Clone)]
pub struct PermuteReport {
    pub loops_in: usize,
    pub loops_kept: usize,
    pub warnings: usize,
    pub observed: f64,
    pub stats: DistributionStats,
}

impl fmt::Display for PermuteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "loops\t{}", self.loops_in)?;
        writeln!(f, "loops_validated\t{}", self.loops_kept)?;
        writeln!(f, "validation_warnings\t{}", self.warnings)?;
        write!(f, "{}", self.stats)
    }
}

/// Permute command configuration.
#[derive(Debug, Clone)]
pub struct PermuteCommand {
    pub flag_end_size: u64,
    pub runs: usize,
    pub workers: usize,
    pub seed: Option<u64>,
    /// Ratio distribution file, one ratio per run.
    pub ratio_out: Option<PathBuf>,
    /// Directory for the simulated loop sets.
    pub sim_dir: Option<PathBuf>,
    pub output: OutputConfig,
}

impl Default for PermuteCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl PermuteCommand {
    pub fn new() -> Self {
        Self {
            flag_end_size: DEFAULT_FLAG_END_SIZE,
            runs: 100,
            workers: default_workers(),
            seed: None,
            ratio_out: None,
            sim_dir: None,
            output: OutputConfig::default(),
        }
    }

    pub fn run(
        &self,
        loops: &[LoopRecord],
        chromosomes: &ChromosomeTable,
        intervals: &[Interval],
    ) -> Result<PermuteReport> {
        let report = ValidateCommand::new()
            .with_flag_end_size(self.flag_end_size)
            .validate(loops, chromosomes);
        info!(
            "Validated {} loops: {} kept, {} warnings",
            loops.len(),
            report.loops.len(),
            report.warning_count()
        );

        let index = IntervalIndex::from_intervals(intervals);
        let observed = overlap_ratio(&report.loops, &index)?;
        info!("Observed overlap ratio: {}", observed);

        if let Some(dir) = &self.sim_dir {
            fs::create_dir_all(dir)?;
        }

        let simulate = SimulateCommand::new()
            .with_runs(self.runs)
            .with_workers(self.workers)
            .with_seed(self.seed);
        let runs = simulate.simulate_map(&report.loops, chromosomes, |i, set| {
            if let Some(dir) = &self.sim_dir {
                write_loops(simulation_path(dir, i), &set, self.output)?;
            }
            overlap_ratio(&set, &index)
        })?;

        let total = runs.len();
        let ratios: Vec<f64> = runs.into_iter().filter_map(|r| r.result.ok()).collect();
        if ratios.len() < total {
            return Err(LoopError::SimulationFailed {
                failed: total - ratios.len(),
                total,
            });
        }

        if let Some(path) = &self.ratio_out {
            write_ratios(path, &ratios)?;
            info!("Ratio distribution written to {}", path.display());
        }

        let stats = summarize(&ratios, Some(observed))?;
        Ok(PermuteReport {
            loops_in: loops.len(),
            loops_kept: report.loops.len(),
            warnings: report.warning_count(),
            observed,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vec<LoopRecord>, ChromosomeTable, Vec<Interval>) {
        let loops = vec![
            LoopRecord::intra("chr1", 10_000, 15_000, 60_000, 65_000),
            LoopRecord::intra("chr1", 400_000, 405_000, 480_000, 485_000),
            LoopRecord::new("chr1", 1_000, 2_000, "chr2", 5_000, 6_000),
            LoopRecord::intra("chr2", 50_000, 52_000, 90_000, 92_000),
        ];
        let table = ChromosomeTable::parse("chr1\t0\t2000000\nchr2\t0\t1000000\n").unwrap();
        let intervals = vec![Interval::new("chr1", 12_000, 13_000)];
        (loops, table, intervals)
    }

    /// One short loop on each of ten small chromosomes, with an interval over
    /// the first half of every chromosome, so simulated ratios vary by run.
    fn spread_setup() -> (Vec<LoopRecord>, ChromosomeTable, Vec<Interval>) {
        let names: Vec<String> = (1..=10).map(|i| format!("chr{}", i)).collect();
        let loops = names
            .iter()
            .map(|c| LoopRecord::intra(c, 100, 110, 150, 160))
            .collect();
        let regions: String = names.iter().map(|c| format!("{}\t0\t2000\n", c)).collect();
        let table = ChromosomeTable::parse(&regions).unwrap();
        let intervals = names.iter().map(|c| Interval::new(c, 0, 999)).collect();
        (loops, table, intervals)
    }

    #[test]
    fn test_permute_end_to_end() {
        let (loops, table, intervals) = setup();
        let cmd = PermuteCommand {
            runs: 20,
            workers: 2,
            seed: Some(7),
            ..PermuteCommand::new()
        };
        let report = cmd.run(&loops, &table, &intervals).unwrap();

        assert_eq!(report.loops_in, 4);
        assert_eq!(report.loops_kept, 3);
        assert!((report.observed - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.stats.n, 20);
        assert!(report.stats.min >= 0.0 && report.stats.max <= 1.0);
    }

    #[test]
    fn test_permute_writes_outputs() {
        let (loops, table, intervals) = spread_setup();
        let dir = tempfile::tempdir().unwrap();
        let cmd = PermuteCommand {
            runs: 10,
            workers: 2,
            seed: Some(1),
            ratio_out: Some(dir.path().join("ratios.txt")),
            sim_dir: Some(dir.path().join("sims")),
            ..PermuteCommand::new()
        };
        let report = cmd.run(&loops, &table, &intervals);
        assert!(report.is_ok(), "{:?}", report.err());

        assert!(dir.path().join("sims/sim_hi-c_0.loop").exists());
        assert!(dir.path().join("sims/sim_hi-c_9.loop").exists());
        let ratios = crate::table::read_ratios(dir.path().join("ratios.txt")).unwrap();
        assert_eq!(ratios.len(), 10);
    }

    #[test]
    fn test_permute_drops_unknown_chromosome_rows() {
        let (mut loops, table, intervals) = spread_setup();
        loops.push(LoopRecord::intra("chrM", 100, 110, 150, 160));
        let cmd = PermuteCommand {
            runs: 20,
            workers: 2,
            seed: Some(3),
            ..PermuteCommand::new()
        };
        let report = cmd.run(&loops, &table, &intervals).unwrap();

        assert_eq!(report.loops_in, 11);
        assert_eq!(report.loops_kept, 10);
        assert_eq!(report.observed, 1.0);
        assert_eq!(report.stats.n, 20);
    }

    #[test]
    fn test_permute_empty_after_validation() {
        let (_, table, intervals) = setup();
        let loops = vec![LoopRecord::new("chr1", 1_000, 2_000, "chr2", 5_000, 6_000)];
        let err = PermuteCommand::new()
            .run(&loops, &table, &intervals)
            .unwrap_err();
        assert!(matches!(err, LoopError::EmptyLoopSet));
    }
}
