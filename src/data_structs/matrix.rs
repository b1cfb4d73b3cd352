//! Dense matrix inputs to the regression engine: the nested design pair and
//! the per-chromosome coverage matrix with its row-chunk partitioning.

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView2, Axis};

/// Target number of matrix cells decoded by one regression chunk when no
/// explicit chunk size is configured.
const DEFAULT_CHUNK_CELLS: usize = 1 << 22;
const MIN_CHUNK_ROWS: usize = 1024;

/// Design matrix with samples as rows and covariates as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix(Array2<f64>);

impl DesignMatrix {
    pub fn new(inner: Array2<f64>) -> Self {
        Self(inner)
    }

    pub fn n_samples(&self) -> usize {
        self.0.nrows()
    }

    pub fn n_covariates(&self) -> usize {
        self.0.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }

    /// Row-reordered copy; used to permute sample labels without touching
    /// the coverage matrix.
    pub fn permute_rows(&self, permutation: &[usize]) -> Self {
        Self(self.0.select(Axis(0), permutation))
    }
}

/// Alternative/null design pair for the nested-model F statistic.
///
/// The null model's column space is assumed to lie inside the alternative's;
/// only the dimensional preconditions are checked here.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedDesign {
    full: DesignMatrix,
    null: DesignMatrix,
}

impl NestedDesign {
    pub fn try_new(full: DesignMatrix, null: DesignMatrix) -> Result<Self> {
        ensure!(
            full.n_samples() == null.n_samples(),
            "Design matrices disagree on sample count: {} vs {}",
            full.n_samples(),
            null.n_samples()
        );
        ensure!(
            null.n_covariates() < full.n_covariates(),
            "Null design must have fewer covariates than the alternative ({} >= {})",
            null.n_covariates(),
            full.n_covariates()
        );
        ensure!(
            full.n_samples() > full.n_covariates(),
            "Need more samples than covariates: {} samples, {} covariates",
            full.n_samples(),
            full.n_covariates()
        );
        Ok(Self { full, null })
    }

    pub fn full(&self) -> &DesignMatrix {
        &self.full
    }

    pub fn null(&self) -> &DesignMatrix {
        &self.null
    }

    pub fn n_samples(&self) -> usize {
        self.full.n_samples()
    }

    /// Numerator degrees of freedom, `p - p0`.
    pub fn df_numerator(&self) -> f64 {
        (self.full.n_covariates() - self.null.n_covariates()) as f64
    }

    /// Denominator degrees of freedom, `n - p`.
    pub fn df_denominator(&self) -> f64 {
        (self.full.n_samples() - self.full.n_covariates()) as f64
    }

    /// Applies the same row permutation to both matrices of the pair.
    pub fn permute_rows(&self, permutation: &[usize]) -> Self {
        Self {
            full: self.full.permute_rows(permutation),
            null: self.null.permute_rows(permutation),
        }
    }
}

/// Scaled, log2-transformed coverage for the retained positions of one
/// chromosome; rows are positions, columns are samples.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMatrix(Array2<f64>);

impl CoverageMatrix {
    pub fn new(inner: Array2<f64>) -> Self {
        Self(inner)
    }

    pub fn n_positions(&self) -> usize {
        self.0.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.0.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }

    /// Chunk row count keeping the decoded working set near
    /// [`DEFAULT_CHUNK_CELLS`] cells.
    pub fn auto_chunk_size(&self) -> usize {
        (DEFAULT_CHUNK_CELLS / self.n_samples().max(1)).max(MIN_CHUNK_ROWS)
    }

    /// Row-chunk views tagged with their starting row, so results can be
    /// reassembled in original order after parallel processing. The final
    /// chunk may be shorter.
    pub fn row_chunks(&self, chunk_size: usize) -> Vec<(usize, ArrayView2<'_, f64>)> {
        self.0
            .axis_chunks_iter(Axis(0), chunk_size)
            .enumerate()
            .map(|(index, view)| (index * chunk_size, view))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn two_group_design() -> NestedDesign {
        let full = DesignMatrix::new(array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]]);
        let null = DesignMatrix::new(array![[1.0], [1.0], [1.0], [1.0]]);
        NestedDesign::try_new(full, null).unwrap()
    }

    #[test]
    fn test_nested_design_dims() {
        let design = two_group_design();
        assert_eq!(design.n_samples(), 4);
        assert_eq!(design.df_numerator(), 1.0);
        assert_eq!(design.df_denominator(), 2.0);
    }

    #[test]
    fn test_nested_design_rejects_mismatched_rows() {
        let full = DesignMatrix::new(array![[1.0, 0.0], [1.0, 1.0], [1.0, 1.0]]);
        let null = DesignMatrix::new(array![[1.0], [1.0]]);
        assert!(NestedDesign::try_new(full, null).is_err());
    }

    #[test]
    fn test_nested_design_rejects_non_nested_widths() {
        let full = DesignMatrix::new(array![[1.0], [1.0], [1.0]]);
        let null = DesignMatrix::new(array![[1.0], [1.0], [1.0]]);
        assert!(NestedDesign::try_new(full, null).is_err());
    }

    #[test]
    fn test_permute_rows() {
        let design = two_group_design();
        let permuted = design.permute_rows(&[2, 3, 0, 1]);
        assert_eq!(permuted.full().view().column(1).to_vec(), vec![
            1.0, 1.0, 0.0, 0.0
        ]);
    }

    #[test]
    fn test_row_chunks_cover_all_rows() {
        let coverage = CoverageMatrix::new(Array2::zeros((10, 3)));
        let chunks = coverage.row_chunks(4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].0, 0);
        assert_eq!(chunks[2].0, 8);
        assert_eq!(chunks[2].1.nrows(), 2);
    }
}
