//! Error types shared by every loopsim component.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading, validating, simulating or testing loops.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Chromosome '{0}' is not declared in the chromosome region table")]
    UnknownChromosome(String),

    /// The placement range `[1 + res/2, len - res/2 - sep)` is empty or inverted.
    #[error(
        "Cannot place loop on {chrom} (row {row}): anchor size {res}, separation {separation}, chromosome length {chrom_len}"
    )]
    InfeasiblePlacement {
        chrom: String,
        row: usize,
        res: i64,
        separation: i64,
        chrom_len: u64,
    },

    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),

    #[error("Cannot compute an overlap ratio for an empty loop set")]
    EmptyLoopSet,

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{failed} of {total} simulation runs failed")]
    SimulationFailed { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, LoopError>;
