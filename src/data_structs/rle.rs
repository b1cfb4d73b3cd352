//! Run-length encoded sequences for long position-indexed tracks.
//!
//! Chromosome-scale masks and per-base statistics are stored as ordered
//! `(value, run-length)` pairs and are decoded through windows, never as a
//! full-length dense buffer. A prefix-offset index alongside the runs makes
//! window and point lookups O(log runs), so per-cluster extraction never
//! rescans the whole run vector. Two invariants hold at all times: adjacent
//! runs never carry an equal value, and run lengths sum to the sequence
//! length; `offsets[i]` is always the decoded start position of run `i`.

use std::iter::repeat;

/// Run-length encoded sequence of position-indexed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rle<T> {
    runs: Vec<(T, u32)>,
    offsets: Vec<usize>,
    len: usize,
}

/// Mask of genomic positions retained after a coverage cutoff.
pub type PositionMask = Rle<bool>;

impl<T> Rle<T> {
    pub fn new() -> Self {
        Self {
            runs: Vec::new(),
            offsets: Vec::new(),
            len: 0,
        }
    }

    /// Total decoded length of the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn runs(&self) -> &[(T, u32)] {
        &self.runs
    }

    /// Index of the run covering `position`. Caller guarantees
    /// `position < self.len`.
    fn run_index(&self, position: usize) -> usize {
        self.offsets.partition_point(|&offset| offset <= position) - 1
    }

    /// Random-access decode of a single position, via binary search on the
    /// offset index.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        Some(&self.runs[self.run_index(index)].0)
    }

    /// Decoded iterator over every position.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.runs
            .iter()
            .flat_map(|(value, count)| repeat(value).take(*count as usize))
    }

    /// Runs clipped to the half-open window `[start, end)`. Binary-searches
    /// the first overlapping run and stops at the window's end, so the cost
    /// is O(log runs + runs inside the window).
    pub fn window(&self, start: usize, end: usize) -> impl Iterator<Item = (&T, usize)> + '_ {
        let first = if start < self.len && start < end {
            self.run_index(start)
        } else {
            self.runs.len()
        };
        (first..self.runs.len())
            .take_while(move |&run| self.offsets[run] < end)
            .filter_map(move |run| {
                let (value, count) = &self.runs[run];
                let run_start = self.offsets[run];
                let run_end = run_start + *count as usize;
                let lo = run_start.max(start);
                let hi = run_end.min(end);
                if lo < hi {
                    Some((value, hi - lo))
                } else {
                    None
                }
            })
    }
}

impl<T: PartialEq + Clone> Rle<T> {
    pub fn from_slice(values: &[T]) -> Self {
        let mut rle = Self::new();
        for value in values {
            rle.push(value.clone());
        }
        rle
    }

    pub fn push(&mut self, value: T) {
        self.push_run(value, 1)
    }

    /// Appends a run, merging it with the last one when the values compare
    /// equal.
    pub fn push_run(&mut self, value: T, count: u32) {
        if count == 0 {
            return;
        }
        if let Some((last, last_count)) = self.runs.last_mut() {
            if *last == value {
                *last_count += count;
                self.len += count as usize;
                return;
            }
        }
        self.offsets.push(self.len);
        self.runs.push((value, count));
        self.len += count as usize;
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq + Clone> FromIterator<T> for Rle<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut rle = Self::new();
        for value in iter {
            rle.push(value);
        }
        rle
    }
}

impl Rle<f64> {
    /// Appends a statistic value. Equality is on the bit pattern so that
    /// long stretches of `NaN` (e.g. from a singular design) still collapse
    /// into a single run.
    pub fn push_stat(&mut self, value: f64) {
        if let Some((last, last_count)) = self.runs.last_mut() {
            if last.to_bits() == value.to_bits() {
                *last_count += 1;
                self.len += 1;
                return;
            }
        }
        self.offsets.push(self.len);
        self.runs.push((value, 1));
        self.len += 1;
    }

    pub fn from_stats(values: &[f64]) -> Self {
        let mut rle = Self::new();
        for &value in values {
            rle.push_stat(value);
        }
        rle
    }

    /// Concatenates another statistic sequence, merging the boundary runs if
    /// they carry the same bit pattern.
    pub fn append_stats(&mut self, other: Rle<f64>) {
        for (value, count) in other.runs {
            if let Some((last, last_count)) = self.runs.last_mut() {
                if last.to_bits() == value.to_bits() {
                    *last_count += count;
                    self.len += count as usize;
                    continue;
                }
            }
            self.offsets.push(self.len);
            self.runs.push((value, count));
            self.len += count as usize;
        }
    }
}

impl Rle<bool> {
    /// Number of retained (true) positions.
    pub fn retained_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|(value, _)| *value)
            .map(|(_, count)| *count as usize)
            .sum()
    }

    /// Iterates `(genomic_start, run_length)` over the retained runs.
    pub fn true_runs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.runs
            .iter()
            .zip(self.offsets.iter())
            .filter_map(|((value, count), &start)| {
                if *value {
                    Some((start, *count as usize))
                } else {
                    None
                }
            })
    }

    /// Genomic coordinate of the n-th retained position (0-based among the
    /// retained positions only).
    pub fn genomic_position(&self, retained_index: usize) -> Option<usize> {
        let mut remaining = retained_index;
        for (start, len) in self.true_runs() {
            if remaining < len {
                return Some(start + remaining);
            }
            remaining -= len;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let values = vec![1, 1, 2, 2, 2, 3, 1, 1];
        let rle = Rle::from_slice(&values);
        assert_eq!(rle.len(), values.len());
        assert_eq!(rle.n_runs(), 4);
        assert_eq!(rle.to_vec(), values);
    }

    #[test]
    fn test_adjacent_runs_unequal() {
        let mut rle = Rle::new();
        rle.push_run(5u8, 3);
        rle.push_run(5u8, 2);
        rle.push_run(7u8, 1);
        assert_eq!(rle.runs(), &[(5, 5), (7, 1)]);
        assert_eq!(rle.len(), 6);
    }

    #[test]
    fn test_get() {
        let rle = Rle::from_slice(&[10, 10, 20, 30, 30, 30]);
        assert_eq!(rle.get(0), Some(&10));
        assert_eq!(rle.get(1), Some(&10));
        assert_eq!(rle.get(2), Some(&20));
        assert_eq!(rle.get(3), Some(&30));
        assert_eq!(rle.get(5), Some(&30));
        assert_eq!(rle.get(6), None);
    }

    #[test]
    fn test_offsets_track_run_starts() {
        let mut rle = Rle::from_stats(&[1.0, 1.0, 2.0]);
        rle.append_stats(Rle::from_stats(&[2.0, 3.0, 3.0]));
        // runs: (1.0, 2) (2.0, 2) (3.0, 2); every position decodes through
        // the rebuilt index
        assert_eq!(rle.n_runs(), 3);
        let decoded: Vec<f64> = (0..rle.len()).map(|i| *rle.get(i).unwrap()).collect();
        assert_eq!(decoded, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_window_clips_runs() {
        let rle = Rle::from_slice(&[1, 1, 1, 2, 2, 3, 3, 3]);
        let window: Vec<(i32, usize)> = rle
            .window(2, 6)
            .map(|(value, len)| (*value, len))
            .collect();
        assert_eq!(window, vec![(1, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn test_window_deep_in_sequence() {
        // many runs before the window; only the overlapping runs are visited
        let values: Vec<usize> = (0..10_000).collect();
        let rle = Rle::from_slice(&values);
        let window: Vec<(usize, usize)> = rle
            .window(9_995, 9_998)
            .map(|(value, len)| (*value, len))
            .collect();
        assert_eq!(window, vec![(9_995, 1), (9_996, 1), (9_997, 1)]);
        assert!(rle.window(10_000, 10_005).next().is_none());
        assert!(rle.window(5, 5).next().is_none());
    }

    #[test]
    fn test_nan_runs_collapse() {
        let rle = Rle::from_stats(&[f64::NAN, f64::NAN, 1.0, 1.0, f64::NAN]);
        assert_eq!(rle.n_runs(), 3);
        assert_eq!(rle.len(), 5);
    }

    #[test]
    fn test_append_stats_merges_boundary() {
        let mut left = Rle::from_stats(&[1.0, 2.0, 2.0]);
        let right = Rle::from_stats(&[2.0, 3.0]);
        left.append_stats(right);
        assert_eq!(left.len(), 5);
        assert_eq!(left.runs(), &[(1.0, 1), (2.0, 3), (3.0, 1)]);
        assert_eq!(left.get(3), Some(&2.0));
        assert_eq!(left.get(4), Some(&3.0));
    }

    #[test]
    fn test_mask_helpers() {
        let mask: PositionMask =
            Rle::from_slice(&[false, true, true, false, false, true, true, true]);
        assert_eq!(mask.retained_count(), 5);
        let runs: Vec<(usize, usize)> = mask.true_runs().collect();
        assert_eq!(runs, vec![(1, 2), (5, 3)]);
        assert_eq!(mask.genomic_position(0), Some(1));
        assert_eq!(mask.genomic_position(2), Some(5));
        assert_eq!(mask.genomic_position(4), Some(7));
        assert_eq!(mask.genomic_position(5), None);
    }
}
