//! Significance of an observed overlap ratio against the null distribution.

use std::fmt;
use std::path::Path;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{LoopError, Result};
use crate::table::read_ratios;

/// Summary of a null distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionStats {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (divisor `n - 1`).
    pub stdev: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub significance: Option<Significance>,
}

/// One-sided tests of an observed ratio against the null distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Significance {
    pub observed: f64,
    /// Fraction of null samples strictly greater than the observed value.
    pub empirical_p: f64,
    pub z: f64,
    /// Upper tail of the standard normal at `z`.
    pub parametric_p: f64,
}

/// Summarize a null distribution, optionally testing an observed ratio.
pub fn summarize(null: &[f64], observed: Option<f64>) -> Result<DistributionStats> {
    let n = null.len();
    if n == 0 {
        return Err(LoopError::DegenerateDistribution(
            "no null samples".to_string(),
        ));
    }
    if n == 1 {
        return Err(LoopError::DegenerateDistribution(
            "standard deviation needs at least two null samples".to_string(),
        ));
    }
    if let Some(bad) = null.iter().find(|v| !v.is_finite()) {
        return Err(LoopError::DegenerateDistribution(format!(
            "non-finite null sample: {}",
            bad
        )));
    }

    let mut sorted = null.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (min, max) = (sorted[0], sorted[n - 1]);

    // Constant samples: avoid a rounding-noise stdev
    let (mean, stdev) = if min == max {
        (min, 0.0)
    } else {
        let mean = null.iter().sum::<f64>() / n as f64;
        let variance = null.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        (mean, variance.sqrt())
    };
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let significance = match observed {
        Some(observed) => {
            if stdev == 0.0 {
                return Err(LoopError::DegenerateDistribution(
                    "null samples are all equal; z-score is undefined".to_string(),
                ));
            }
            let above = null.iter().filter(|v| **v > observed).count();
            let z = (observed - mean) / stdev;
            Some(Significance {
                observed,
                empirical_p: above as f64 / n as f64,
                z,
                parametric_p: normal_sf(z)?,
            })
        }
        None => None,
    };

    Ok(DistributionStats {
        n,
        mean,
        stdev,
        min,
        median,
        max,
        significance,
    })
}

/// Survival function `P(Z > z)` of the standard normal.
pub fn normal_sf(z: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| LoopError::DegenerateDistribution(e.to_string()))?;
    Ok(normal.sf(z))
}

/// Stats command: summarize a ratio distribution file.
#[derive(Debug, Clone, Default)]
pub struct StatsCommand {
    pub observed: Option<f64>,
}

impl StatsCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observed(mut self, observed: Option<f64>) -> Self {
        self.observed = observed;
        self
    }

    pub fn run<P: AsRef<Path>>(&self, ratio_file: P) -> Result<DistributionStats> {
        let null = read_ratios(ratio_file)?;
        summarize(&null, self.observed)
    }
}

impl fmt::Display for DistributionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples\t{}", self.n)?;
        writeln!(f, "mean\t{}", self.mean)?;
        writeln!(f, "stdev\t{}", self.stdev)?;
        writeln!(f, "min\t{}", self.min)?;
        writeln!(f, "median\t{}", self.median)?;
        write!(f, "max\t{}", self.max)?;
        if let Some(sig) = &self.significance {
            writeln!(f)?;
            writeln!(f, "observed\t{}", sig.observed)?;
            writeln!(f, "empirical_p\t{}", sig.empirical_p)?;
            writeln!(f, "z\t{}", sig.z)?;
            write!(f, "parametric_p\t{}", sig.parametric_p)?;
        }
        Ok(())
    }
}
