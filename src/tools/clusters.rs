//! Gap-bounded clustering of retained positions.
//!
//! Walks only the runs of the position mask, so the cost is O(number of
//! runs) rather than O(chromosome length). The resulting partition is
//! computed once per chromosome and reused unchanged by every permutation
//! pass, which keeps permuted and observed segmentations comparable.

use log::debug;

use crate::data_structs::region::Cluster;
use crate::data_structs::rle::PositionMask;

/// Partitions the retained positions into maximal clusters where consecutive
/// retained positions are separated by at most `max_gap` intervening
/// non-retained bases. A gap exactly equal to `max_gap` stays inside the
/// cluster.
pub fn make_clusters(mask: &PositionMask, max_gap: usize) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    // (retained-index start, genomic start) of the cluster being built
    let mut open: Option<(usize, usize)> = None;
    let mut retained = 0usize;
    let mut prev_pos = 0usize;

    for (genomic_start, len) in mask.true_runs() {
        if let Some((start, cluster_genomic_start)) = open {
            let gap = genomic_start - prev_pos - 1;
            if gap > max_gap {
                clusters.push(Cluster {
                    id: clusters.len(),
                    start,
                    end: retained,
                    genomic_start: cluster_genomic_start,
                    genomic_end: prev_pos + 1,
                });
                open = Some((retained, genomic_start));
            }
        } else {
            open = Some((retained, genomic_start));
        }
        retained += len;
        prev_pos = genomic_start + len - 1;
    }

    if let Some((start, cluster_genomic_start)) = open {
        clusters.push(Cluster {
            id: clusters.len(),
            start,
            end: retained,
            genomic_start: cluster_genomic_start,
            genomic_end: prev_pos + 1,
        });
    }

    debug!(
        "Clustered {} retained positions into {} clusters (max_gap = {})",
        retained,
        clusters.len(),
        max_gap
    );
    clusters
}
