//! Empirical significance of candidate regions against the permutation
//! null pool.
//!
//! p-values use add-one smoothing over a strict greater-than comparison of
//! areas, so every p lies in `[1/(N+1), 1]` for a pool of size N. q-values
//! apply a Storey-style null-proportion estimate on top of the
//! Benjamini-Hochberg step; a degenerate estimate leaves all q-values
//! undefined while the regions themselves are still returned.

use adjustp::{adjust, Procedure};
use itertools::Itertools;
use log::{debug, warn};

use crate::data_structs::region::{NullPoolEntry, RegionTable, Regions, SignificanceResult};

/// Evaluation point of the null-proportion estimate.
const PI0_LAMBDA: f64 = 0.5;

/// Significance cutoffs applied to the empirical p- and q-values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceThresholds {
    pub p_threshold: f64,
    pub q_threshold: f64,
}

impl Default for SignificanceThresholds {
    fn default() -> Self {
        Self {
            p_threshold: 0.05,
            q_threshold: 0.1,
        }
    }
}

/// Combines observed regions with the null pool into the final table,
/// ordered by area descending.
///
/// `null_pool = None` means permutation testing was skipped entirely; all
/// significance fields come back undefined. An empty pool from permutations
/// that produced no qualifying region is valid and gives p = 1 everywhere.
pub fn calculate_pvalues(
    regions: Regions,
    null_pool: Option<&[NullPoolEntry]>,
    thresholds: &SignificanceThresholds,
) -> RegionTable {
    let regions = match regions {
        Regions::Found(regions) => regions,
        Regions::Empty => {
            debug!("No candidate regions to evaluate");
            return RegionTable::default();
        }
    };

    let mut results = match null_pool {
        None => regions
            .into_iter()
            .map(|region| SignificanceResult {
                region,
                p_value: None,
                q_value: None,
                significant_p: None,
                significant_q: None,
            })
            .collect_vec(),
        Some(pool) => {
            let mut null_areas = pool.iter().map(|entry| entry.area).collect_vec();
            null_areas.sort_by(f64::total_cmp);
            let pool_size = null_areas.len();

            let p_values = regions
                .iter()
                .map(|region| {
                    let not_greater = null_areas.partition_point(|&area| area <= region.area);
                    (pool_size - not_greater + 1) as f64 / (pool_size + 1) as f64
                })
                .collect_vec();
            let q_values = fdr_adjust(&p_values);

            regions
                .into_iter()
                .zip(p_values)
                .enumerate()
                .map(|(index, (region, p_value))| {
                    let q_value = q_values.as_ref().map(|qs| qs[index]);
                    SignificanceResult {
                        region,
                        p_value: Some(p_value),
                        q_value,
                        significant_p: Some(p_value < thresholds.p_threshold),
                        significant_q: q_value.map(|q| q < thresholds.q_threshold),
                    }
                })
                .collect_vec()
        }
    };

    // area is continuous while p is quantised by the permutation count, so
    // area is the primary ranking key
    results.sort_by(|a, b| b.region.area.total_cmp(&a.region.area));
    RegionTable::new(results)
}

/// Storey-style q-values: pi0 estimate times the Benjamini-Hochberg
/// adjustment. Returns `None` when the pi0 estimate is degenerate.
fn fdr_adjust(p_values: &[f64]) -> Option<Vec<f64>> {
    let m = p_values.len();
    let above = p_values.iter().filter(|&&p| p > PI0_LAMBDA).count();
    let pi0 = above as f64 / (m as f64 * (1.0 - PI0_LAMBDA));
    if !pi0.is_finite() || pi0 <= 0.0 {
        warn!("Degenerate null-proportion estimate (pi0 = {pi0}); q-values left undefined");
        return None;
    }
    let pi0 = pi0.min(1.0);
    let bh = adjust(p_values, Procedure::BenjaminiHochberg);
    Some(bh.into_iter().map(|q| (q * pi0).min(1.0)).collect_vec())
}
