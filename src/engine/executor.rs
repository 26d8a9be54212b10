//! Fork-join dispatch of windowed passes over row bands.
//!
//! Every call is one independent episode: build a pool of `T` threads,
//! split the output rows into `T` bands, run one worker per non-empty band,
//! join, then report faults. No pool or buffer outlives the call.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};

use ndarray::{Array3, ArrayViewMut3, Axis};

use super::border::BorderPolicy;
use super::buffer::{AuxiliaryStatsBuffer, ChannelMode, PixelBuffer};
use super::partition::{RowBand, RowPartitioner};
use super::snapshot::Snapshot;
use crate::error::{FaultKind, FaultReport, FilterError, FilterResult, WorkerFault};

/// Per-pixel algorithm applied over a window.
///
/// `compute` must depend only on `source` and the coordinates; it is called
/// concurrently from every worker.
pub trait WindowOperator: Sync {
    type Output: Copy + Send + Default;

    fn border(&self) -> BorderPolicy;

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<Self::Output, FaultKind>;
}

/// A complete filter invocation on a caller's buffer.
pub trait Filter {
    fn apply_with(&self, executor: &ParallelFilterExecutor, buffer: &mut PixelBuffer)
        -> FilterResult<()>;

    /// Run with one worker per logical processor.
    fn apply_in_place(&self, buffer: &mut PixelBuffer) -> FilterResult<()> {
        self.apply_with(&ParallelFilterExecutor::new(), buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelFilterExecutor {
    partitioner: RowPartitioner,
}

impl Default for ParallelFilterExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelFilterExecutor {
    /// One worker per logical processor.
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_workers(workers)
    }

    /// Fixed worker count, clamped to at least one.
    pub fn with_workers(workers: usize) -> Self {
        ParallelFilterExecutor {
            partitioner: RowPartitioner::new(workers),
        }
    }

    /// Number of bands, and threads, per fork-join episode.
    pub fn workers(&self) -> usize {
        self.partitioner.workers()
    }

    /// Snapshot `buffer`, then overwrite every sample with `op`'s result
    /// computed from the snapshot.
    ///
    /// # Arguments
    /// * `buffer` - Image updated in place
    /// * `op` - Per-pixel operator, called concurrently from every band
    ///
    /// # Returns
    /// `Ok` once every band has joined, or `Workers` with all faults of
    /// the episode. Rows a faulting band wrote before its fault stay written.
    pub fn apply_in_place<W>(&self, buffer: &mut PixelBuffer, op: &W) -> FilterResult<()>
    where
        W: WindowOperator<Output = u8>,
    {
        let snapshot = Snapshot::take(buffer);
        self.fork_join(buffer.view_mut(), |row, col, channel, _| {
            op.compute(&snapshot, row, col, channel)
        })
    }

    /// Run `op` over `source` into a fresh auxiliary buffer. `source` is only
    /// borrowed for reading, so no snapshot is taken.
    ///
    /// # Returns
    /// Buffer with the same shape as `source`, one f32 per sample
    pub fn compute_aux<W>(
        &self,
        source: &PixelBuffer,
        op: &W,
    ) -> FilterResult<AuxiliaryStatsBuffer>
    where
        W: WindowOperator<Output = f32>,
    {
        let mut out = Array3::<f32>::zeros((source.height(), source.width(), source.channels()));
        self.fork_join(out.view_mut(), |row, col, channel, _| {
            op.compute(source, row, col, channel)
        })?;
        Ok(AuxiliaryStatsBuffer::from_array(out))
    }

    /// Replace every sample with `f(value, row, col, channel)`. Each sample
    /// depends only on itself, so no snapshot is taken.
    pub fn map_in_place<F>(&self, buffer: &mut PixelBuffer, f: F) -> FilterResult<()>
    where
        F: Fn(u8, usize, usize, usize) -> Result<u8, FaultKind> + Sync,
    {
        self.fork_join(buffer.view_mut(), |row, col, channel, value| {
            f(value, row, col, channel)
        })
    }

    /// Build a new buffer of `mode`, computing each sample from `source`.
    pub fn map_into<F>(
        &self,
        source: &PixelBuffer,
        mode: ChannelMode,
        f: F,
    ) -> FilterResult<PixelBuffer>
    where
        F: Fn(&PixelBuffer, usize, usize, usize) -> Result<u8, FaultKind> + Sync,
    {
        let mut out = PixelBuffer::new(source.width(), source.height(), mode);
        self.fork_join(out.view_mut(), |row, col, channel, _| {
            f(source, row, col, channel)
        })?;
        Ok(out)
    }

    /// Reduce each non-empty band of `height` rows with `f`. Results come
    /// back in band order so the caller can merge them deterministically.
    pub fn fold_bands<A, F>(&self, height: usize, f: F) -> FilterResult<Vec<A>>
    where
        A: Send,
        F: Fn(RowBand) -> A + Sync,
    {
        let units: Vec<(RowBand, ())> = self
            .partitioner
            .partition(height)
            .into_iter()
            .map(|band| (band, ()))
            .collect();
        let outcomes = self.dispatch(units, |band, ()| Ok(f(band)))?;
        self.join_report(outcomes)
    }

    /// Core episode: split `out` into bands and let each worker fill its
    /// rows sample by sample.
    fn fork_join<T, F>(&self, out: ArrayViewMut3<'_, T>, per_sample: F) -> FilterResult<()>
    where
        T: Copy + Send,
        F: Fn(usize, usize, usize, T) -> Result<T, FaultKind> + Sync,
    {
        let bands = self.partitioner.partition(out.dim().0);
        let mut units = Vec::with_capacity(bands.len());
        let mut rest = out;
        for band in bands {
            let (rows, tail) = rest.split_at(Axis(0), band.len());
            units.push((band, rows));
            rest = tail;
        }

        let outcomes = self.dispatch(units, |band, rows| fill_band(band, rows, &per_sample))?;
        self.join_report(outcomes).map(|_| ())
    }

    /// Spawn one worker per non-empty unit on a pool built for this call and
    /// block until all of them finish. Panics are caught per worker.
    fn dispatch<U, R, W>(
        &self,
        units: Vec<(RowBand, U)>,
        work: W,
    ) -> FilterResult<Vec<Option<Result<R, WorkerFault>>>>
    where
        U: Send,
        R: Send,
        W: Fn(RowBand, U) -> Result<R, WorkerFault> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers())
            .thread_name(|i| format!("row-band-{}", i))
            .build()?;

        let rows: usize = units.iter().map(|(band, _)| band.len()).sum();
        log::debug!(
            "fork-join episode: {} row(s) over {} band(s)",
            rows,
            units.len()
        );

        let mut outcomes: Vec<Option<Result<R, WorkerFault>>> =
            units.iter().map(|_| None).collect();
        let work = &work;
        pool.scope(|scope| {
            for ((band, unit), slot) in units.into_iter().zip(outcomes.iter_mut()) {
                if band.is_empty() {
                    continue;
                }
                scope.spawn(move |_| {
                    log::trace!("band {} rows {}..{}", band.index, band.start, band.end);
                    let result = panic::catch_unwind(AssertUnwindSafe(|| work(band, unit)));
                    *slot = Some(match result {
                        Ok(outcome) => outcome,
                        Err(payload) => Err(WorkerFault {
                            band: band.index,
                            location: None,
                            kind: FaultKind::Panicked(panic_message(payload)),
                        }),
                    });
                });
            }
        });

        Ok(outcomes)
    }

    /// Turn per-band outcomes into results, or one aggregated error.
    fn join_report<R>(
        &self,
        outcomes: Vec<Option<Result<R, WorkerFault>>>,
    ) -> FilterResult<Vec<R>> {
        let mut results = Vec::with_capacity(outcomes.len());
        let mut faults = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(r) => results.push(r),
                Err(fault) => faults.push(fault),
            }
        }
        match FaultReport::collect(faults, self.workers()) {
            Some(report) => {
                log::warn!("{}", report);
                Err(FilterError::Workers(report))
            }
            None => Ok(results),
        }
    }
}

/// Worker body. Stops at the first fault in its band; rows already written
/// stay written.
fn fill_band<T, F>(
    band: RowBand,
    mut rows: ArrayViewMut3<'_, T>,
    per_sample: &F,
) -> Result<(), WorkerFault>
where
    T: Copy,
    F: Fn(usize, usize, usize, T) -> Result<T, FaultKind>,
{
    let (_, width, channels) = rows.dim();
    for (local, row) in band.rows().enumerate() {
        for col in 0..width {
            for channel in 0..channels {
                let current = rows[[local, col, channel]];
                match per_sample(row, col, channel, current) {
                    Ok(value) => rows[[local, col, channel]] = value,
                    Err(kind) => {
                        return Err(WorkerFault {
                            band: band.index,
                            location: Some((row, col, channel)),
                            kind,
                        })
                    }
                }
            }
        }
    }
    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Reads the pixel one row below (skip border).
    struct ShiftUp;

    impl WindowOperator for ShiftUp {
        type Output = u8;

        fn border(&self) -> BorderPolicy {
            BorderPolicy::Skip
        }

        fn compute(
            &self,
            source: &PixelBuffer,
            row: usize,
            col: usize,
            channel: usize,
        ) -> Result<u8, FaultKind> {
            Ok(self
                .border()
                .resolve(source, row as isize + 1, col as isize, channel, (row, col))
                .unwrap_or(0))
        }
    }

    /// Fails on a single row.
    struct FailOnRow(usize);

    impl WindowOperator for FailOnRow {
        type Output = u8;

        fn border(&self) -> BorderPolicy {
            BorderPolicy::Skip
        }

        fn compute(
            &self,
            source: &PixelBuffer,
            row: usize,
            col: usize,
            channel: usize,
        ) -> Result<u8, FaultKind> {
            if row == self.0 {
                Err(FaultKind::NonFinite(f32::NAN))
            } else {
                Ok(source.get(row, col, channel).saturating_add(1))
            }
        }
    }

    fn rows_image(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, ChannelMode::Gray, |r, _, _| r as u8)
    }

    #[test]
    fn test_reads_come_from_snapshot() {
        // Every output row must equal the *original* next row, even where
        // the band above has already overwritten it.
        for workers in 1..6 {
            let mut buf = rows_image(3, 9);
            ParallelFilterExecutor::with_workers(workers)
                .apply_in_place(&mut buf, &ShiftUp)
                .unwrap();
            for r in 0..8 {
                assert_eq!(buf.get(r, 0, 0), r as u8 + 1);
            }
            assert_eq!(buf.get(8, 2, 0), 0);
        }
    }

    #[test]
    fn test_fault_reported_after_join() {
        let mut buf = rows_image(4, 8);
        let err = ParallelFilterExecutor::with_workers(4)
            .apply_in_place(&mut buf, &FailOnRow(2))
            .unwrap_err();

        match err {
            FilterError::Workers(report) => {
                assert_eq!(report.faults().len(), 1);
                assert_eq!(report.first().band, 1);
                assert_eq!(report.first().location, Some((2, 0, 0)));
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Other bands completed their writes.
        assert_eq!(buf.get(0, 0, 0), 1);
        assert_eq!(buf.get(7, 3, 0), 8);
    }

    #[test]
    fn test_panic_becomes_fault() {
        let mut buf = rows_image(2, 4);
        let err = ParallelFilterExecutor::with_workers(2)
            .map_in_place(&mut buf, |v, row, _, _| {
                if row == 3 {
                    panic!("bad row");
                }
                Ok(v)
            })
            .unwrap_err();

        match err {
            FilterError::Workers(report) => {
                assert_eq!(report.first().band, 1);
                assert_eq!(report.first().kind, FaultKind::Panicked("bad row".into()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_every_sample_written_once() {
        let seen = Mutex::new(HashSet::new());
        let mut buf = PixelBuffer::new(5, 7, ChannelMode::Rgb);
        ParallelFilterExecutor::with_workers(3)
            .map_in_place(&mut buf, |v, row, col, channel| {
                assert!(seen.lock().unwrap().insert((row, col, channel)));
                Ok(v)
            })
            .unwrap();
        assert_eq!(seen.into_inner().unwrap().len(), 5 * 7 * 3);
    }

    #[test]
    fn test_empty_image_is_noop() {
        let mut buf = PixelBuffer::new(0, 0, ChannelMode::Gray);
        ParallelFilterExecutor::with_workers(4)
            .apply_in_place(&mut buf, &ShiftUp)
            .unwrap();
        assert_eq!(buf.height(), 0);
    }

    #[test]
    fn test_more_workers_than_rows() {
        let mut buf = rows_image(2, 2);
        ParallelFilterExecutor::with_workers(8)
            .apply_in_place(&mut buf, &ShiftUp)
            .unwrap();
        assert_eq!(buf.as_raw(), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_map_into_changes_mode() {
        let src = PixelBuffer::filled(3, 2, ChannelMode::Rgb, 9);
        let out = ParallelFilterExecutor::with_workers(2)
            .map_into(&src, ChannelMode::Gray, |s, r, c, _| Ok(s.get(r, c, 2) * 2))
            .unwrap();
        assert_eq!(out.mode(), ChannelMode::Gray);
        assert_eq!(out.as_raw(), vec![18; 6]);
    }

    #[test]
    fn test_fold_bands_in_order() {
        let sums = ParallelFilterExecutor::with_workers(3)
            .fold_bands(10, |band| band.rows().sum::<usize>())
            .unwrap();
        assert_eq!(sums, vec![0 + 1 + 2, 3 + 4 + 5, 6 + 7 + 8 + 9]);
    }

    #[test]
    fn test_fold_bands_skips_empty() {
        let counts = ParallelFilterExecutor::with_workers(6)
            .fold_bands(2, |band| band.len())
            .unwrap();
        assert_eq!(counts, vec![2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_output_independent_of_worker_count(
            width in 1usize..12,
            height in 1usize..24,
            workers in 1usize..9,
        ) {
            let src = PixelBuffer::from_fn(width, height, ChannelMode::Gray, |r, c, _| {
                ((r * 31 + c * 17) % 256) as u8
            });
            let mut single = src.clone();
            let mut many = src;
            ParallelFilterExecutor::with_workers(1).apply_in_place(&mut single, &ShiftUp).unwrap();
            ParallelFilterExecutor::with_workers(workers)
                .apply_in_place(&mut many, &ShiftUp)
                .unwrap();
            prop_assert_eq!(single, many);
        }
    }
}
