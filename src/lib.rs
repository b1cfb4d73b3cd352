pub mod data_structs;
pub mod tools;
pub mod utils;

pub use data_structs::matrix::{CoverageMatrix, DesignMatrix, NestedDesign};
pub use data_structs::region::{
    CandidateRegion, Cluster, NullPoolEntry, RegionTable, Regions, SignificanceResult,
};
pub use data_structs::rle::{PositionMask, Rle};
pub use tools::config::DiffRegionConfig;
pub use tools::regions::{Cutoff, RegionAnnotation, RegionFinder};
pub use tools::regression::ChunkedRegressionEngine;
pub use tools::significance::SignificanceThresholds;
