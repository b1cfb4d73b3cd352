//! Shared utilities: the crate-wide rayon thread pool and small numeric
//! helpers used by several components.

use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var("DERFIND_NUM_THREADS")
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .expect("Failed to create thread pool")
});

pub fn n_threads() -> usize {
    THREAD_POOL.current_num_threads()
}

/// Width-weighted mean of a run-encoded window. Returns `NaN` for an empty
/// window.
pub(crate) fn window_mean(
    rle: &crate::data_structs::rle::Rle<f64>,
    start: usize,
    end: usize,
) -> f64 {
    let mut sum = 0.0;
    let mut width = 0usize;
    for (value, len) in rle.window(start, end) {
        sum += *value * len as f64;
        width += len;
    }
    if width == 0 {
        f64::NAN
    } else {
        sum / width as f64
    }
}
