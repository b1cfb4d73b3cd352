//! End-to-end configuration and driver for one chromosome.
//!
//! Wires the components together: mask -> clusters, coverage + design ->
//! observed statistics -> candidate regions, then the permutation null pool
//! and the significance table.

use anyhow::{ensure, Result};
use log::info;

use crate::data_structs::matrix::{CoverageMatrix, NestedDesign};
use crate::data_structs::region::RegionTable;
use crate::data_structs::rle::PositionMask;
use crate::tools::clusters::make_clusters;
use crate::tools::permutation::build_null_pool;
use crate::tools::regions::{Cutoff, RegionAnnotation, RegionFinder};
use crate::tools::regression::ChunkedRegressionEngine;
use crate::tools::significance::{calculate_pvalues, SignificanceThresholds};

#[derive(Debug, Clone)]
pub struct DiffRegionConfig {
    pub cutoff: Cutoff,
    /// Largest run of non-retained bases allowed inside one cluster.
    pub max_gap: usize,
    /// Regression chunk rows; `None` derives a size from the sample count.
    pub chunk_size: Option<usize>,
    /// Stabiliser added to the alternative model's RSS.
    pub adjust_f: f64,
    pub n_permute: usize,
    /// Per-permutation seeds; length must equal `n_permute` when present.
    pub seeds: Option<Vec<u64>>,
    pub thresholds: SignificanceThresholds,
}

impl Default for DiffRegionConfig {
    fn default() -> Self {
        Self {
            cutoff: Cutoff::Symmetric(1.0),
            max_gap: 300,
            chunk_size: None,
            adjust_f: 0.0,
            n_permute: 0,
            seeds: None,
            thresholds: SignificanceThresholds::default(),
        }
    }
}

impl DiffRegionConfig {
    /// Runs the full detection pass for one chromosome and returns the
    /// annotated region table, ordered by area descending.
    pub fn analyze(
        &self,
        coverage: &CoverageMatrix,
        mask: &PositionMask,
        design: &NestedDesign,
        annotation: Option<RegionAnnotation<'_>>,
    ) -> Result<RegionTable> {
        ensure!(
            mask.retained_count() == coverage.n_positions(),
            "Mask retains {} positions but coverage has {} rows",
            mask.retained_count(),
            coverage.n_positions()
        );
        ensure!(
            coverage.n_samples() == design.n_samples(),
            "Coverage has {} sample columns but design has {} rows",
            coverage.n_samples(),
            design.n_samples()
        );
        if let Some(seeds) = &self.seeds {
            ensure!(
                seeds.len() == self.n_permute,
                "Seed list length {} does not match permutation count {}",
                seeds.len(),
                self.n_permute
            );
        }

        let clusters = make_clusters(mask, self.max_gap);
        info!(
            "Analyzing {} retained positions across {} samples in {} clusters",
            coverage.n_positions(),
            coverage.n_samples(),
            clusters.len()
        );

        let engine = ChunkedRegressionEngine::new(self.adjust_f, self.chunk_size);
        let stats = engine.fstats(coverage, design)?;

        let mut finder = RegionFinder::new(self.cutoff, &clusters).with_mask(mask);
        if let Some(annotation) = annotation {
            finder = finder.with_annotation(annotation);
        }
        let regions = finder.find(&stats, false);
        info!("Found {} candidate regions", regions.len());

        let null_pool = if self.n_permute > 0 {
            Some(build_null_pool(
                coverage,
                design,
                &engine,
                self.cutoff,
                &clusters,
                self.n_permute,
                self.seeds.as_deref(),
            )?)
        } else {
            None
        };

        Ok(calculate_pvalues(
            regions,
            null_pool.as_deref(),
            &self.thresholds,
        ))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use crate::data_structs::matrix::DesignMatrix;
    use crate::data_structs::rle::Rle;

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

    #[test]
    fn test_mask_coverage_mismatch_is_fatal() {
        let config = DiffRegionConfig::default();
        let mask: PositionMask = Rle::from_slice(&vec![true; 5]);
        let coverage = CoverageMatrix::new(Array2::zeros((4, 6)));
        let design = two_group_design(3);
        assert!(config.analyze(&coverage, &mask, &design, None).is_err());
    }

    #[test]
    fn test_seed_mismatch_is_fatal_before_compute() {
        let config = DiffRegionConfig {
            n_permute: 4,
            seeds: Some(vec![1, 2]),
            ..Default::default()
        };
        let mask: PositionMask = Rle::from_slice(&vec![true; 5]);
        let coverage = CoverageMatrix::new(Array2::zeros((5, 6)));
        let design = two_group_design(3);
        assert!(config.analyze(&coverage, &mask, &design, None).is_err());
    }
}
