pub mod matrix;
pub mod region;
pub mod rle;
