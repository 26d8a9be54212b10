//! Local and global image statistics.
//!
//! Local mean and variance are accumulated with Welford's update over the
//! in-range window samples (skip border policy) and divide by the actual
//! sample count, so edge pixels are not pulled toward zero. Global
//! statistics come from a histogram built per band and merged in band order.

use crate::engine::{
    BorderPolicy, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
use crate::error::{FaultKind, FilterError, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStat {
    Mean,
    /// Sample variance, `M2 / (n - 1)`; 0 for a single sample.
    Variance,
}

/// Running mean and squared-deviation sum.
#[derive(Debug, Clone, Copy, Default)]
struct Welford {
    n: u32,
    mean: f64,
    m2: f64,
}

impl Welford {
    #[inline]
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / (self.n - 1) as f64
        } else {
            0.0
        }
    }
}

/// Windowed mean or variance producing an auxiliary buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalStats {
    window: Window,
    stat: LocalStat,
}

impl LocalStats {
    /// # Arguments
    /// * `radius` - Half side of the square window, at most
    ///   [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    /// * `stat` - Which statistic each pixel receives
    pub fn new(radius: usize, stat: LocalStat) -> FilterResult<Self> {
        Ok(LocalStats {
            window: Window::square(radius)?,
            stat,
        })
    }

    pub fn mean(radius: usize) -> FilterResult<Self> {
        Self::new(radius, LocalStat::Mean)
    }

    pub fn variance(radius: usize) -> FilterResult<Self> {
        Self::new(radius, LocalStat::Variance)
    }

    pub fn stat(&self) -> LocalStat {
        self.stat
    }
}

impl WindowOperator for LocalStats {
    type Output = f32;

    fn border(&self) -> BorderPolicy {
        BorderPolicy::Skip
    }

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<f32, FaultKind> {
        let mut acc = Welford::default();
        for cell in self.window.cells() {
            let sample = self.border().resolve(
                source,
                row as isize + cell.d_row,
                col as isize + cell.d_col,
                channel,
                (row, col),
            );
            if let Some(v) = sample {
                acc.push(v as f64);
            }
        }
        let value = match self.stat {
            LocalStat::Mean => acc.mean,
            LocalStat::Variance => acc.variance(),
        } as f32;
        if !value.is_finite() {
            return Err(FaultKind::NonFinite(value));
        }
        Ok(value)
    }
}

/// Display variant: replaces the image with its local mean or variance,
/// rounded and clamped to 0-255.
impl Filter for LocalStats {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!(
            "Applying local {:?}: radius {}",
            self.stat,
            self.window.radius()
        );
        let aux = executor.compute_aux(buffer, self)?;
        *buffer = aux.to_pixel_buffer(buffer.mode())?;
        Ok(())
    }
}

// ============================================================================
// Global statistics prepass
// ============================================================================

/// Histogram-derived scalars for one channel of a whole image.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
    histogram: [u64; 256],
    count: u64,
}

impl GlobalStats {
    /// Build the histogram of `channel`, one partial histogram per band.
    ///
    /// # Arguments
    /// * `executor` - Runs one reduction per band
    /// * `source` - Image, only read
    /// * `channel` - Channel index, below `source.channels()`
    ///
    /// # Returns
    /// The merged statistics, identical for any worker count
    pub fn compute(
        executor: &ParallelFilterExecutor,
        source: &PixelBuffer,
        channel: usize,
    ) -> FilterResult<Self> {
        if channel >= source.channels() {
            return Err(FilterError::invalid(
                "channel",
                format!("{} out of range for a {} buffer", channel, source.mode()),
            ));
        }
        let partials = executor.fold_bands(source.height(), |band| {
            let mut hist = [0u64; 256];
            for row in band.rows() {
                for col in 0..source.width() {
                    hist[source.get(row, col, channel) as usize] += 1;
                }
            }
            hist
        })?;

        let mut histogram = [0u64; 256];
        for partial in &partials {
            for (total, n) in histogram.iter_mut().zip(partial.iter()) {
                *total += n;
            }
        }
        let count = histogram.iter().sum();
        Ok(GlobalStats { histogram, count })
    }

    pub fn histogram(&self) -> &[u64; 256] {
        &self.histogram
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<u8> {
        self.histogram.iter().position(|&n| n > 0).map(|v| v as u8)
    }

    pub fn max(&self) -> Option<u8> {
        self.histogram.iter().rposition(|&n| n > 0).map(|v| v as u8)
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let sum: u64 = self
            .histogram
            .iter()
            .enumerate()
            .map(|(v, &n)| v as u64 * n)
            .sum();
        sum as f64 / self.count as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self
            .histogram
            .iter()
            .enumerate()
            .map(|(v, &n)| {
                let d = v as f64 - mean;
                d * d * n as f64
            })
            .sum();
        ss / self.count as f64
    }
}
