//! Order-statistic filters: alpha-trimmed mean, median and rank select.
//!
//! Every window is gathered into a fixed-size array of `area` samples.
//! Cells outside the image are filled with the center pixel, so a corner
//! pixel sorts the same number of values as an interior one.
//!
//! ## Supported Formats
//!
//! Grayscale and RGB; channels are processed independently.

use super::clamp_u8;
use crate::engine::{
    BorderPolicy, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
use crate::error::{FaultKind, FilterError, FilterResult};

fn gather_sorted(
    window: &Window,
    source: &PixelBuffer,
    row: usize,
    col: usize,
    channel: usize,
) -> Vec<u8> {
    let mut values: Vec<u8> = window
        .cells()
        .iter()
        .filter_map(|cell| {
            BorderPolicy::SubstituteCenter.resolve(
                source,
                row as isize + cell.d_row,
                col as isize + cell.d_col,
                channel,
                (row, col),
            )
        })
        .collect();
    values.sort_unstable();
    values
}

// ============================================================================
// Alpha-trimmed mean
// ============================================================================

/// Sorts the window, drops `trim` values from each end and averages the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaTrimmedMean {
    window: Window,
    trim: usize,
}

impl AlphaTrimmedMean {
    /// `trim` may be at most half the window area (rounded down), which
    /// always leaves at least one sample.
    pub fn new(radius: usize, trim: usize) -> FilterResult<Self> {
        let window = Window::square(radius)?;
        let max_trim = window.area() / 2;
        if trim > max_trim {
            return Err(FilterError::invalid(
                "trim",
                format!("{} exceeds half the {}-sample window ({})", trim, window.area(), max_trim),
            ));
        }
        Ok(AlphaTrimmedMean { window, trim })
    }

    pub fn trim(&self) -> usize {
        self.trim
    }
}

impl WindowOperator for AlphaTrimmedMean {
    type Output = u8;

    fn border(&self) -> BorderPolicy {
        BorderPolicy::SubstituteCenter
    }

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<u8, FaultKind> {
        let values = gather_sorted(&self.window, source, row, col, channel);
        let n = values.len();
        let trim = self.trim.min(n.saturating_sub(1) / 2);
        let kept = &values[trim..n - trim];
        let sum: u32 = kept.iter().map(|&v| v as u32).sum();
        Ok(clamp_u8(sum as f32 / kept.len().max(1) as f32))
    }
}

impl Filter for AlphaTrimmedMean {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!(
            "Applying alpha-trimmed mean: radius {}, trim {}",
            self.window.radius(),
            self.trim
        );
        executor.apply_in_place(buffer, self)
    }
}

// ============================================================================
// Rank select / median
// ============================================================================

/// Picks the `rank`-th smallest value of the window (0 = minimum).
#[derive(Debug, Clone, PartialEq)]
pub struct RankSelect {
    window: Window,
    rank: usize,
}

impl RankSelect {
    /// # Arguments
    /// * `radius` - Half side of the square window
    /// * `rank` - Position in the sorted window, below `(2r+1)^2`
    ///
    /// # Returns
    /// The filter, or `InvalidParameter` for an oversized radius or rank
    pub fn new(radius: usize, rank: usize) -> FilterResult<Self> {
        let window = Window::square(radius)?;
        if rank >= window.area() {
            return Err(FilterError::invalid(
                "rank",
                format!("must be below the window area {}, got {}", window.area(), rank),
            ));
        }
        Ok(RankSelect { window, rank })
    }

    /// Median filter. Removes salt-and-pepper noise while preserving edges.
    pub fn median(radius: usize) -> FilterResult<Self> {
        let window = Window::square(radius)?;
        let rank = window.area() / 2;
        Ok(RankSelect { window, rank })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl WindowOperator for RankSelect {
    type Output = u8;

    fn border(&self) -> BorderPolicy {
        BorderPolicy::SubstituteCenter
    }

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<u8, FaultKind> {
        let values = gather_sorted(&self.window, source, row, col, channel);
        let idx = self.rank.min(values.len().saturating_sub(1));
        Ok(values.get(idx).copied().unwrap_or_else(|| source.get(row, col, channel)))
    }
}

impl Filter for RankSelect {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!(
            "Applying rank select: radius {}, rank {}",
            self.window.radius(),
            self.rank
        );
        executor.apply_in_place(buffer, self)
    }
}
