//! Static row partitioning.
//!
//! `height` rows are cut into `T` contiguous bands. The first `T - 1` bands
//! get `height / T` rows each and the last band takes whatever remains, so
//! the same inputs always produce the same bands.

use std::ops::Range;

/// A contiguous run of rows owned by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBand {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub is_last: bool,
}

impl RowBand {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Empty bands are valid no-op units of work.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartitioner {
    workers: usize,
}

impl RowPartitioner {
    /// Partitioner for `workers` bands (at least one).
    pub fn new(workers: usize) -> Self {
        RowPartitioner {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn partition(&self, height: usize) -> Vec<RowBand> {
        let per_band = height / self.workers;
        (0..self.workers)
            .map(|index| {
                let is_last = index + 1 == self.workers;
                let start = index * per_band;
                let end = if is_last { height } else { start + per_band };
                RowBand {
                    index,
                    start,
                    end,
                    is_last,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let bands = RowPartitioner::new(4).partition(8);
        let rows: Vec<_> = bands.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(rows, vec![(0, 2), (2, 4), (4, 6), (6, 8)]);
        assert!(bands[3].is_last);
        assert!(!bands[0].is_last);
    }

    #[test]
    fn test_last_band_takes_remainder() {
        let bands = RowPartitioner::new(3).partition(10);
        assert_eq!(bands.iter().map(RowBand::len).collect::<Vec<_>>(), vec![3, 3, 4]);
    }

    #[test]
    fn test_fewer_rows_than_workers() {
        let bands = RowPartitioner::new(5).partition(3);
        assert_eq!(bands.len(), 5);
        assert!(bands[..4].iter().all(RowBand::is_empty));
        assert_eq!(bands[4].rows(), 0..3);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let bands = RowPartitioner::new(0).partition(6);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].rows(), 0..6);
    }

    proptest! {
        #[test]
        fn test_bands_cover_every_row_once(height in 0usize..200, extra in 0usize..6) {
            for workers in 1..=height + extra {
                let bands = RowPartitioner::new(workers).partition(height);
                prop_assert_eq!(bands.len(), workers);

                let mut next = 0;
                for band in &bands {
                    prop_assert_eq!(band.start, next);
                    prop_assert!(band.end >= band.start);
                    next = band.end;
                }
                prop_assert_eq!(next, height);
            }
        }

        #[test]
        fn test_partition_is_deterministic(height in 0usize..500, workers in 1usize..32) {
            let p = RowPartitioner::new(workers);
            prop_assert_eq!(p.partition(height), p.partition(height));
        }
    }
}
