//! Command implementations for loopsim.

pub mod analyze;
pub mod permute;
pub mod simulate;
pub mod stats;
pub mod validate;

pub use analyze::{annotate_overlaps, overlap_ratio, AnalyzeCommand, BatchStats, OverlapResult};
pub use permute::{PermuteCommand, PermuteReport};
pub use simulate::{
    place, simulate_run, LoopSimulator, SimulateCommand, SimulateStats, SimulationRun,
};
pub use stats::{normal_sf, summarize, DistributionStats, Significance, StatsCommand};
pub use validate::{
    RemovalReason, ValidateCommand, ValidationReport, ValidationWarning, DEFAULT_FLAG_END_SIZE,
};
