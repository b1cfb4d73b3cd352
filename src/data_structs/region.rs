//! Region-level data structures: clusters, candidate regions, null-pool
//! entries and the final significance table handed to the reporting layer.

use polars::prelude::*;
use serde::Serialize;

/// Maximal gap-bounded interval of retained positions.
///
/// `start`/`end` index the retained positions (the rows of the coverage
/// matrix), `genomic_start`/`genomic_end` are the chromosome coordinates of
/// the interval. Computed once per chromosome and reused unchanged by every
/// permutation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub genomic_start: usize,
    pub genomic_end: usize,
}

impl Cluster {
    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Contiguous above-cutoff run inside a cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRegion {
    pub cluster_id: usize,
    /// Index range over retained positions, half-open.
    pub start: usize,
    pub end: usize,
    /// Number of retained bases in the region.
    pub width: usize,
    /// Width-weighted mean statistic.
    pub stat: f64,
    /// Sum of |stat| over the region, width-weighted.
    pub area: f64,
    pub genomic_start: Option<usize>,
    pub genomic_end: Option<usize>,
    pub mean_coverage: Option<f64>,
    /// Per-group region mean coverage, keyed by the group label.
    pub group_means: Option<Vec<(String, f64)>>,
    pub log2_fold_change: Option<f64>,
}

/// Region extraction outcome. `Empty` is a normal result, not an error;
/// callers treat it as "no data".
#[derive(Debug, Clone, PartialEq)]
pub enum Regions {
    Found(Vec<CandidateRegion>),
    Empty,
}

impl Regions {
    pub fn from_vec(regions: Vec<CandidateRegion>) -> Self {
        if regions.is_empty() {
            Regions::Empty
        } else {
            Regions::Found(regions)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Regions::Empty)
    }

    pub fn into_vec(self) -> Vec<CandidateRegion> {
        match self {
            Regions::Found(regions) => regions,
            Regions::Empty => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Regions::Found(regions) => regions.len(),
            Regions::Empty => 0,
        }
    }
}

/// One permuted-region summary contributed to the null distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullPoolEntry {
    pub stat: f64,
    pub width: usize,
    pub area: f64,
    pub permutation: usize,
}

/// Candidate region annotated with empirical significance. `None` fields are
/// explicitly undefined (no permutations, or a degenerate FDR estimate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignificanceResult {
    #[serde(flatten)]
    pub region: CandidateRegion,
    pub p_value: Option<f64>,
    pub q_value: Option<f64>,
    pub significant_p: Option<bool>,
    pub significant_q: Option<bool>,
}

/// Final region table, ordered by area descending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionTable {
    results: Vec<SignificanceResult>,
}

impl RegionTable {
    pub fn new(results: Vec<SignificanceResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[SignificanceResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignificanceResult> + '_ {
        self.results.iter()
    }

    /// Flat tabular view for the downstream reporting layer. Every group
    /// mean track carried on the regions becomes its own `mean_<group>`
    /// column.
    pub fn into_dataframe(self) -> PolarsResult<DataFrame> {
        let rows = &self.results;
        let region = |f: fn(&CandidateRegion) -> u64| -> Vec<u64> {
            rows.iter().map(|r| f(&r.region)).collect()
        };
        // all annotated rows share the same group set, so the first one
        // fixes the column layout
        let group_names: Vec<String> = rows
            .iter()
            .find_map(|r| r.region.group_means.as_ref())
            .map(|means| means.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default();

        let mut columns = vec![
            Column::new("cluster".into(), region(|r| r.cluster_id as u64)),
            Column::new("start".into(), region(|r| r.start as u64)),
            Column::new("end".into(), region(|r| r.end as u64)),
            Column::new(
                "genomic_start".into(),
                rows.iter()
                    .map(|r| r.region.genomic_start.map(|v| v as u64))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "genomic_end".into(),
                rows.iter()
                    .map(|r| r.region.genomic_end.map(|v| v as u64))
                    .collect::<Vec<_>>(),
            ),
            Column::new("width".into(), region(|r| r.width as u64)),
            Column::new(
                "stat".into(),
                rows.iter().map(|r| r.region.stat).collect::<Vec<_>>(),
            ),
            Column::new(
                "area".into(),
                rows.iter().map(|r| r.region.area).collect::<Vec<_>>(),
            ),
            Column::new(
                "mean_coverage".into(),
                rows.iter()
                    .map(|r| r.region.mean_coverage)
                    .collect::<Vec<_>>(),
            ),
        ];
        for (index, name) in group_names.iter().enumerate() {
            columns.push(Column::new(
                format!("mean_{name}").into(),
                rows.iter()
                    .map(|r| {
                        r.region
                            .group_means
                            .as_ref()
                            .map(|means| means[index].1)
                    })
                    .collect::<Vec<_>>(),
            ));
        }
        columns.extend([
            Column::new(
                "log2_fold_change".into(),
                rows.iter()
                    .map(|r| r.region.log2_fold_change)
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "p_value".into(),
                rows.iter().map(|r| r.p_value).collect::<Vec<_>>(),
            ),
            Column::new(
                "q_value".into(),
                rows.iter().map(|r| r.q_value).collect::<Vec<_>>(),
            ),
            Column::new(
                "significant_p".into(),
                rows.iter().map(|r| r.significant_p).collect::<Vec<_>>(),
            ),
            Column::new(
                "significant_q".into(),
                rows.iter().map(|r| r.significant_q).collect::<Vec<_>>(),
            ),
        ]);
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_region(area: f64) -> CandidateRegion {
        CandidateRegion {
            cluster_id: 0,
            start: 0,
            end: 3,
            width: 3,
            stat: 2.0,
            area,
            genomic_start: Some(10),
            genomic_end: Some(13),
            mean_coverage: None,
            group_means: None,
            log2_fold_change: None,
        }
    }

    #[test]
    fn test_regions_from_vec() {
        assert!(Regions::from_vec(Vec::new()).is_empty());
        let found = Regions::from_vec(vec![dummy_region(6.0)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found.into_vec().len(), 1);
    }

    #[test]
    fn test_table_to_dataframe() {
        let table = RegionTable::new(vec![SignificanceResult {
            region: dummy_region(6.0),
            p_value: Some(0.01),
            q_value: None,
            significant_p: Some(true),
            significant_q: None,
        }]);
        let df = table.into_dataframe().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 14);
        assert!(df.column("q_value").unwrap().null_count() == 1);
    }

    #[test]
    fn test_group_means_become_columns() {
        let mut region = dummy_region(6.0);
        region.group_means = Some(vec![
            ("case".to_string(), 8.0),
            ("control".to_string(), 2.0),
        ]);
        region.log2_fold_change = Some(2.0);
        let table = RegionTable::new(vec![SignificanceResult {
            region,
            p_value: Some(0.01),
            q_value: Some(0.05),
            significant_p: Some(true),
            significant_q: Some(true),
        }]);
        let df = table.into_dataframe().unwrap();
        assert_eq!(df.width(), 16);
        let case = df.column("mean_case").unwrap().as_materialized_series();
        let control = df.column("mean_control").unwrap().as_materialized_series();
        assert_eq!(case.f64().unwrap().get(0), Some(8.0));
        assert_eq!(control.f64().unwrap().get(0), Some(2.0));
    }
}
