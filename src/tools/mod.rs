pub mod clusters;
pub mod config;
pub mod permutation;
pub mod regions;
pub mod regression;
pub mod significance;
