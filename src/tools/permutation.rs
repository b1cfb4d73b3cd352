//! Null-distribution construction by sample-label permutation.
//!
//! Each permutation reorders the rows of both design matrices with the same
//! label shuffle, reruns the regression over the full chromosome and
//! extracts regions in basic mode against the observed cluster partition
//! and cutoff. Resulting {stat, width, area} tuples are pooled; only pool
//! membership matters downstream, so permutations merge in any order.

use anyhow::{ensure, Result};
use itertools::Itertools;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::data_structs::matrix::{CoverageMatrix, NestedDesign};
use crate::data_structs::region::{Cluster, NullPoolEntry, Regions};
use crate::tools::regions::{Cutoff, RegionFinder};
use crate::tools::regression::ChunkedRegressionEngine;
use crate::utils::THREAD_POOL;

/// Runs `n_permute` label permutations and pools the permuted region
/// summaries.
///
/// A seed list, when supplied, must have exactly `n_permute` entries; this
/// is checked before any computation starts. A seeded permutation is
/// reproducible; an unseeded one is not, by design. Each qualifying
/// permuted region contributes one pool entry.
pub fn build_null_pool(
    coverage: &CoverageMatrix,
    design: &NestedDesign,
    engine: &ChunkedRegressionEngine,
    cutoff: Cutoff,
    clusters: &[Cluster],
    n_permute: usize,
    seeds: Option<&[u64]>,
) -> Result<Vec<NullPoolEntry>> {
    if let Some(seeds) = seeds {
        ensure!(
            seeds.len() == n_permute,
            "Seed list length {} does not match permutation count {}",
            seeds.len(),
            n_permute
        );
    }
    if n_permute == 0 {
        return Ok(Vec::new());
    }

    let n_samples = design.n_samples();
    let finder = RegionFinder::new(cutoff, clusters);

    let per_permutation: Result<Vec<Vec<NullPoolEntry>>> = THREAD_POOL.install(|| {
        (0..n_permute)
            .into_par_iter()
            .map(|permutation| {
                let mut rng = match seeds {
                    Some(seeds) => StdRng::seed_from_u64(seeds[permutation]),
                    None => StdRng::from_entropy(),
                };
                let mut labels = (0..n_samples).collect_vec();
                labels.shuffle(&mut rng);

                let permuted = design.permute_rows(&labels);
                let stats = engine.fstats(coverage, &permuted)?;
                let entries = match finder.find(&stats, true) {
                    Regions::Found(regions) => regions
                        .into_iter()
                        .map(|region| NullPoolEntry {
                            stat: region.stat,
                            width: region.width,
                            area: region.area,
                            permutation,
                        })
                        .collect(),
                    Regions::Empty => Vec::new(),
                };
                Ok(entries)
            })
            .collect()
    });

    let pool = per_permutation?.into_iter().flatten().collect_vec();
    info!(
        "Null pool holds {} entries from {} permutations",
        pool.len(),
        n_permute
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use crate::data_structs::matrix::DesignMatrix;
    use crate::data_structs::region::Cluster;

    use super::*;

    fn two_group_design(n_per_group: usize) -> NestedDesign {
        let n = 2 * n_per_group;
        let mut full = Array2::zeros((n, 2));
        for i in 0..n {
            full[[i, 0]] = 1.0;
            full[[i, 1]] = if i < n_per_group { 0.0 } else { 1.0 };
        }
        let null = Array2::ones((n, 1));
        NestedDesign::try_new(DesignMatrix::new(full), DesignMatrix::new(null)).unwrap()
    }

    fn noisy_coverage(n_positions: usize, n_samples: usize) -> CoverageMatrix {
        let mut inner = Array2::zeros((n_positions, n_samples));
        for i in 0..n_positions {
            for j in 0..n_samples {
                inner[[i, j]] = ((i * 13 + j * 7) % 17) as f64 * 0.3;
            }
        }
        CoverageMatrix::new(inner)
    }

    fn whole_cluster(len: usize) -> Vec<Cluster> {
        vec![Cluster {
            id: 0,
            start: 0,
            end: len,
            genomic_start: 0,
            genomic_end: len,
        }]
    }

    #[test]
    fn test_seed_list_length_mismatch_is_fatal() {
        let design = two_group_design(2);
        let coverage = noisy_coverage(10, 4);
        let engine = ChunkedRegressionEngine::new(0.1, None);
        let clusters = whole_cluster(10);
        let result = build_null_pool(
            &coverage,
            &design,
            &engine,
            Cutoff::Symmetric(1.0),
            &clusters,
            5,
            Some(&[1, 2, 3]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_seeded_permutations_are_reproducible() {
        let design = two_group_design(3);
        let coverage = noisy_coverage(40, 6);
        let engine = ChunkedRegressionEngine::new(0.1, Some(16));
        let clusters = whole_cluster(40);
        let seeds: Vec<u64> = (0..8).collect();
        let first = build_null_pool(
            &coverage,
            &design,
            &engine,
            Cutoff::Symmetric(0.5),
            &clusters,
            8,
            Some(&seeds),
        )
        .unwrap();
        let second = build_null_pool(
            &coverage,
            &design,
            &engine,
            Cutoff::Symmetric(0.5),
            &clusters,
            8,
            Some(&seeds),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_are_tagged_with_permutation_id() {
        let design = two_group_design(3);
        let coverage = noisy_coverage(30, 6);
        let engine = ChunkedRegressionEngine::new(0.1, None);
        let clusters = whole_cluster(30);
        let seeds: Vec<u64> = (100..110).collect();
        let pool = build_null_pool(
            &coverage,
            &design,
            &engine,
            Cutoff::Symmetric(0.1),
            &clusters,
            10,
            Some(&seeds),
        )
        .unwrap();
        assert!(pool.iter().all(|entry| entry.permutation < 10));
        assert!(pool.iter().all(|entry| entry.area >= 0.0 && entry.width > 0));
    }

    #[test]
    fn test_zero_permutations_empty_pool() {
        let design = two_group_design(2);
        let coverage = noisy_coverage(10, 4);
        let engine = ChunkedRegressionEngine::new(0.1, None);
        let clusters = whole_cluster(10);
        let pool = build_null_pool(
            &coverage,
            &design,
            &engine,
            Cutoff::Symmetric(1.0),
            &clusters,
            0,
            None,
        )
        .unwrap();
        assert!(pool.is_empty());
    }
}
