// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! loopsim: permutation testing for Hi-C chromatin loops
//!
//! Tests whether loop anchors overlap a set of genomic regions more often
//! than expected by chance.
//!
//! # Features
//!
//! - **Validation**: sorts loops into chromosome order and flags or removes malformed rows
//! - **Null model**: randomized loop placement that keeps anchor sizes, separations and local spacing
//! - **Parallel simulation**: runs execute on a bounded Rayon pool with one generator per run
//! - **Significance**: empirical and z-test p-values for the observed overlap ratio
//!
//! # Example
//!
//! ```rust,no_run
//! use loopsim::{genome::ChromosomeTable, table, commands::PermuteCommand};
//!
//! let loops = table::read_loops("loops.txt").unwrap();
//! let chromosomes = ChromosomeTable::from_file("chrom_regions.txt").unwrap();
//! let intervals = table::read_intervals("peaks.bed").unwrap();
//!
//! let cmd = PermuteCommand { runs: 1000, seed: Some(42), ..PermuteCommand::new() };
//! let report = cmd.run(&loops, &chromosomes, &intervals).unwrap();
//! println!("{}", report);
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod genome;
pub mod index;
pub mod interval;
pub mod parallel;
pub mod table;

// Re-export commonly used types
pub use error::{LoopError, Result};
pub use index::IntervalIndex;
pub use interval::{Interval, LoopRecord};
pub use table::{read_intervals, read_loops, TableReader, TableWriter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{
        AnalyzeCommand, PermuteCommand, SimulateCommand, StatsCommand, ValidateCommand,
    };
    pub use crate::config::{Delimiter, OutputConfig};
    pub use crate::error::{LoopError, Result};
    pub use crate::genome::ChromosomeTable;
    pub use crate::index::IntervalIndex;
    pub use crate::interval::{Interval, LoopRecord};
    pub use crate::table::{read_intervals, read_loops, TableReader, TableWriter};
}
