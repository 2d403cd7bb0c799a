//! Parallel processing utilities using Rayon.

use crate::error::Result;
use crate::interval::LoopRecord;
use rustc_hash::FxHashMap;

/// Row indices of one chromosome, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeGroup {
    pub chrom: String,
    pub rows: Vec<usize>,
}

/// Group loops by their first anchor's chromosome.
///
/// Groups appear in first-seen order and each group lists its rows in input
/// order, so writing every group's output back at the listed row positions
/// reproduces the input layout exactly.
pub fn group_by_chromosome(loops: &[LoopRecord]) -> Vec<ChromosomeGroup> {
    let mut groups: Vec<ChromosomeGroup> = Vec::new();
    let mut positions: FxHashMap<&str, usize> = FxHashMap::default();

    for (row, lp) in loops.iter().enumerate() {
        let chrom = lp.chrom1();
        let pos = *positions.entry(chrom).or_insert_with(|| {
            groups.push(ChromosomeGroup {
                chrom: chrom.to_string(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[pos].rows.push(row);
    }

    groups
}

/// Default worker count: half the available CPUs, rounded, at least one.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.div_ceil(2).max(1)
}

/// Build a bounded worker pool.
pub fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("loopsim-worker-{}", i))
        .build()?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_chromosome_first_seen_order() {
        let loops = vec![
            LoopRecord::intra("chr2", 100, 200, 300, 400),
            LoopRecord::intra("chr1", 100, 200, 300, 400),
            LoopRecord::intra("chr2", 500, 600, 700, 800),
        ];

        let groups = group_by_chromosome(&loops);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chrom, "chr2");
        assert_eq!(groups[0].rows, vec![0, 2]);
        assert_eq!(groups[1].chrom, "chr1");
        assert_eq!(groups[1].rows, vec![1]);
    }

    #[test]
    fn test_group_empty() {
        assert!(group_by_chromosome(&[]).is_empty());
    }

    #[test]
    fn test_default_workers_positive() {
        assert!(default_workers() >= 1);
    }

    #[test]
    fn test_build_pool_size() {
        let pool = build_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }
}
