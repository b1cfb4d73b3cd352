//! Extraction of candidate regions from a statistic sequence.
//!
//! Within each cluster, maximal contiguous runs above the cutoff become
//! candidate regions with width, representative stat and area summaries.
//! In `basic` mode (used inside the permutation loop) genomic coordinates
//! and annotations are skipped.

use crate::data_structs::region::{CandidateRegion, Cluster, Regions};
use crate::data_structs::rle::{PositionMask, Rle};
use crate::utils::window_mean;

/// Significance cutoff on the statistic. `Symmetric` keeps `|stat| > c`;
/// `Asymmetric` keeps `stat > upper` or `stat < lower`, tracking direction so
/// a region never mixes the two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    Symmetric(f64),
    Asymmetric { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Cutoff {
    /// Crossing direction of a value, or `None` when it does not pass the
    /// cutoff. `NaN` never passes.
    fn direction(&self, value: f64) -> Option<Direction> {
        if value.is_nan() {
            return None;
        }
        match *self {
            Cutoff::Symmetric(cutoff) => {
                if value.abs() > cutoff {
                    Some(if value >= 0.0 {
                        Direction::Up
                    } else {
                        Direction::Down
                    })
                } else {
                    None
                }
            }
            Cutoff::Asymmetric { lower, upper } => {
                if value > upper {
                    Some(Direction::Up)
                } else if value < lower {
                    Some(Direction::Down)
                } else {
                    None
                }
            }
        }
    }
}

/// Optional per-base annotation tracks aligned to the retained positions,
/// supplied by the preprocessing stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionAnnotation<'a> {
    pub mean_coverage: Option<&'a Rle<f64>>,
    pub group_means: Option<&'a [(String, Rle<f64>)]>,
}

/// Finds above-cutoff runs inside the fixed cluster partition.
pub struct RegionFinder<'a> {
    cutoff: Cutoff,
    clusters: &'a [Cluster],
    mask: Option<&'a PositionMask>,
    annotation: Option<RegionAnnotation<'a>>,
}

struct RegionAccumulator {
    start: usize,
    width: usize,
    direction: Direction,
    stat_sum: f64,
    area: f64,
}

impl RegionAccumulator {
    fn open(start: usize, direction: Direction, value: f64, len: usize) -> Self {
        let mut acc = Self {
            start,
            width: 0,
            direction,
            stat_sum: 0.0,
            area: 0.0,
        };
        acc.extend(value, len);
        acc
    }

    fn extend(&mut self, value: f64, len: usize) {
        self.width += len;
        self.stat_sum += value * len as f64;
        self.area += value.abs() * len as f64;
    }
}

impl<'a> RegionFinder<'a> {
    pub fn new(cutoff: Cutoff, clusters: &'a [Cluster]) -> Self {
        Self {
            cutoff,
            clusters,
            mask: None,
            annotation: None,
        }
    }

    /// Enables genomic coordinate annotation in non-basic mode.
    pub fn with_mask(mut self, mask: &'a PositionMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Enables coverage/fold-change annotation in non-basic mode.
    pub fn with_annotation(mut self, annotation: RegionAnnotation<'a>) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Extracts candidate regions. With `basic = true` only stat, width and
    /// area are materialised. An outcome with no qualifying region is
    /// `Regions::Empty`, not an error.
    pub fn find(&self, stats: &Rle<f64>, basic: bool) -> Regions {
        let mut regions: Vec<CandidateRegion> = Vec::new();

        for cluster in self.clusters {
            let mut index = cluster.start;
            let mut current: Option<RegionAccumulator> = None;

            for (value, len) in stats.window(cluster.start, cluster.end) {
                let direction = self.cutoff.direction(*value);
                let extends = matches!(
                    (&current, direction),
                    (Some(acc), Some(dir)) if acc.direction == dir
                );
                if extends {
                    if let Some(acc) = current.as_mut() {
                        acc.extend(*value, len);
                    }
                } else {
                    if let Some(acc) = current.take() {
                        regions.push(self.close(acc, cluster, basic));
                    }
                    current = direction.map(|dir| RegionAccumulator::open(index, dir, *value, len));
                }
                index += len;
            }
            if let Some(acc) = current.take() {
                regions.push(self.close(acc, cluster, basic));
            }
        }

        Regions::from_vec(regions)
    }

    fn close(&self, acc: RegionAccumulator, cluster: &Cluster, basic: bool) -> CandidateRegion {
        let end = acc.start + acc.width;
        let mut region = CandidateRegion {
            cluster_id: cluster.id,
            start: acc.start,
            end,
            width: acc.width,
            stat: acc.stat_sum / acc.width as f64,
            area: acc.area,
            genomic_start: None,
            genomic_end: None,
            mean_coverage: None,
            group_means: None,
            log2_fold_change: None,
        };
        if basic {
            return region;
        }

        if let Some(mask) = self.mask {
            region.genomic_start = mask.genomic_position(acc.start);
            region.genomic_end = mask.genomic_position(end - 1).map(|pos| pos + 1);
        }
        if let Some(annotation) = &self.annotation {
            if let Some(mean_coverage) = annotation.mean_coverage {
                region.mean_coverage = Some(window_mean(mean_coverage, acc.start, end));
            }
            if let Some(group_means) = annotation.group_means {
                let means: Vec<(String, f64)> = group_means
                    .iter()
                    .map(|(name, track)| (name.clone(), window_mean(track, acc.start, end)))
                    .collect();
                if let [(_, a), (_, b)] = &means[..] {
                    if *a > 0.0 && *b > 0.0 {
                        region.log2_fold_change = Some((a / b).log2());
                    }
                }
                region.group_means = Some(means);
            }
        }
        region
    }
}
