//! Binarization: global (fixed, Otsu, SIS) and local adaptive (Niblack,
//! Sauvola, Bernsen) thresholds.
//!
//! Global thresholds compute one scalar from the whole image before the
//! per-pixel pass. Adaptive thresholds first fill auxiliary buffers (local
//! mean and variance, or local min and max) with full parallel passes, then
//! compare each pixel against them in a second pass.
//!
//! Output is 255 where the pixel is strictly above its threshold, else 0.
//!
//! ## Supported Formats
//!
//! Grayscale only.

use super::morphology::{square_element, Morphology};
use super::statistics::{GlobalStats, LocalStats};
use crate::engine::window::check_radius;
use crate::engine::{ChannelMode, Filter, ParallelFilterExecutor, PixelBuffer};
use crate::error::{FaultKind, FilterError, FilterResult};

fn binarize<F>(
    executor: &ParallelFilterExecutor,
    buffer: &mut PixelBuffer,
    threshold: F,
) -> FilterResult<()>
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    executor.map_in_place(buffer, |v, row, col, _| {
        let t = threshold(row, col);
        if t.is_nan() {
            return Err(FaultKind::NonFinite(t));
        }
        Ok(if v as f32 > t { 255 } else { 0 })
    })
}

fn check_finite(name: &'static str, value: f32) -> FilterResult<()> {
    if !value.is_finite() {
        return Err(FilterError::invalid(name, format!("must be finite, got {}", value)));
    }
    Ok(())
}

// ============================================================================
// Global thresholds
// ============================================================================

/// Same threshold for every pixel: 255 above it, 0 at or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedThreshold(pub u8);

impl Filter for FixedThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("fixed threshold", ChannelMode::Gray)?;
        log::debug!("Applying fixed threshold {}", self.0);
        let t = self.0 as f32;
        binarize(executor, buffer, |_, _| t)
    }
}

/// Otsu's method: the level maximizing between-class variance of the
/// histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OtsuThreshold;

impl OtsuThreshold {
    /// Global prepass only: histogram of the image, then the Otsu level.
    ///
    /// # Arguments
    /// * `executor` - Runs the per-band histogram pass
    /// * `buffer` - Grayscale image, only read
    ///
    /// # Returns
    /// The level; pixels strictly above it become foreground
    pub fn level(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &PixelBuffer,
    ) -> FilterResult<u8> {
        buffer.require_mode("otsu threshold", ChannelMode::Gray)?;
        let stats = GlobalStats::compute(executor, buffer, 0)?;
        Ok(otsu_level(stats.histogram()))
    }
}

/// Returns the lowest level if the histogram has fewer than two populated bins.
pub fn otsu_level(hist: &[u64; 256]) -> u8 {
    let total: f64 = hist.iter().map(|&n| n as f64).sum();
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let mut best_threshold = hist.iter().position(|&n| n > 0).unwrap_or(0) as u8;
    let mut best_variance = 0.0f64;
    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;

    for (t, &n) in hist.iter().enumerate() {
        weight_bg += n as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }

        sum_bg += t as f64 * n as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;

        let between = weight_bg * weight_fg * (mean_bg - mean_fg) * (mean_bg - mean_fg);
        if between > best_variance {
            best_variance = between;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

impl Filter for OtsuThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        let level = self.level(executor, buffer)?;
        log::debug!("Applying Otsu threshold, level {}", level);
        let t = level as f32;
        binarize(executor, buffer, |_, _| t)
    }
}

/// Simple image statistics: mean intensity weighted by the local gradient
/// `max(|dx|, |dy|)` over interior pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SisThreshold;

impl SisThreshold {
    /// Global prepass only. Falls back to the plain mean when the image has
    /// no gradient at all.
    pub fn level(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &PixelBuffer,
    ) -> FilterResult<f32> {
        buffer.require_mode("sis threshold", ChannelMode::Gray)?;
        let (width, height) = (buffer.width(), buffer.height());
        let partials = executor.fold_bands(height, |band| {
            let mut weighted = 0u64;
            let mut weights = 0u64;
            for row in band.rows() {
                if row == 0 || row + 1 >= height {
                    continue;
                }
                for col in 1..width.saturating_sub(1) {
                    let at = |r: usize, c: usize| buffer.get(r, c, 0) as i32;
                    let ex = (at(row, col + 1) - at(row, col - 1)).unsigned_abs() as u64;
                    let ey = (at(row + 1, col) - at(row - 1, col)).unsigned_abs() as u64;
                    let w = ex.max(ey);
                    weights += w;
                    weighted += w * at(row, col) as u64;
                }
            }
            (weighted, weights)
        })?;

        let (weighted, weights) = partials
            .into_iter()
            .fold((0u64, 0u64), |(a, b), (x, y)| (a + x, b + y));
        if weights == 0 {
            return Ok(GlobalStats::compute(executor, buffer, 0)?.mean() as f32);
        }
        Ok(weighted as f32 / weights as f32)
    }
}

impl Filter for SisThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        let level = self.level(executor, buffer)?;
        log::debug!("Applying SIS threshold, level {:.2}", level);
        binarize(executor, buffer, |_, _| level)
    }
}

// ============================================================================
// Local adaptive thresholds
// ============================================================================

/// `threshold = mean + k * stddev - c`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NiblackThreshold {
    radius: usize,
    k: f32,
    c: f32,
}

impl Default for NiblackThreshold {
    fn default() -> Self {
        NiblackThreshold {
            radius: 15,
            k: 0.2,
            c: 0.0,
        }
    }
}

impl NiblackThreshold {
    /// # Arguments
    /// * `radius` - Half side of the square window, at most
    ///   [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    /// * `k` - Weight of the local standard deviation, usually negative for dark text
    /// * `c` - Constant subtracted from the threshold
    ///
    /// # Returns
    /// The filter, or `InvalidParameter` for an oversized radius or a
    /// non-finite `k` or `c`
    pub fn new(radius: usize, k: f32, c: f32) -> FilterResult<Self> {
        check_radius(radius)?;
        check_finite("k", k)?;
        check_finite("c", c)?;
        Ok(NiblackThreshold { radius, k, c })
    }
}

impl Filter for NiblackThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("niblack threshold", ChannelMode::Gray)?;
        log::debug!(
            "Applying Niblack threshold: radius {}, k {}, c {}",
            self.radius,
            self.k,
            self.c
        );
        let mean = executor.compute_aux(buffer, &LocalStats::mean(self.radius)?)?;
        let var = executor.compute_aux(buffer, &LocalStats::variance(self.radius)?)?;
        binarize(executor, buffer, |r, c| {
            mean.get(r, c, 0) + self.k * var.get(r, c, 0).sqrt() - self.c
        })
    }
}

/// `threshold = mean * (1 + k * (stddev / r - 1))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SauvolaThreshold {
    radius: usize,
    k: f32,
    r: f32,
}

impl Default for SauvolaThreshold {
    fn default() -> Self {
        SauvolaThreshold {
            radius: 15,
            k: 0.5,
            r: 128.0,
        }
    }
}

impl SauvolaThreshold {
    /// # Arguments
    /// * `radius` - Half side of the square window, at most
    ///   [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    /// * `k` - Sensitivity, typically 0.2 to 0.5
    /// * `r` - Dynamic range of the standard deviation; must be positive
    ///
    /// # Returns
    /// The filter, or `InvalidParameter` for out-of-range values
    pub fn new(radius: usize, k: f32, r: f32) -> FilterResult<Self> {
        check_radius(radius)?;
        check_finite("k", k)?;
        check_finite("r", r)?;
        if r <= 0.0 {
            return Err(FilterError::invalid("r", format!("must be positive, got {}", r)));
        }
        Ok(SauvolaThreshold { radius, k, r })
    }
}

impl Filter for SauvolaThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("sauvola threshold", ChannelMode::Gray)?;
        log::debug!(
            "Applying Sauvola threshold: radius {}, k {}, r {}",
            self.radius,
            self.k,
            self.r
        );
        let mean = executor.compute_aux(buffer, &LocalStats::mean(self.radius)?)?;
        let var = executor.compute_aux(buffer, &LocalStats::variance(self.radius)?)?;
        binarize(executor, buffer, |row, col| {
            let m = mean.get(row, col, 0);
            m * (1.0 + self.k * (var.get(row, col, 0).sqrt() / self.r - 1.0))
        })
    }
}

/// Compares each pixel to the midpoint of its local min and max. Windows
/// whose contrast is below `contrast` are classified by the midpoint alone
/// (255 when the midpoint is at least 128).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BernsenThreshold {
    radius: usize,
    contrast: u8,
}

impl Default for BernsenThreshold {
    fn default() -> Self {
        BernsenThreshold {
            radius: 15,
            contrast: 15,
        }
    }
}

impl BernsenThreshold {
    /// # Arguments
    /// * `radius` - Half side of the square window, at most
    ///   [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    /// * `contrast` - Local range below which a window counts as uniform
    pub fn new(radius: usize, contrast: u8) -> FilterResult<Self> {
        check_radius(radius)?;
        Ok(BernsenThreshold { radius, contrast })
    }
}

impl Filter for BernsenThreshold {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("bernsen threshold", ChannelMode::Gray)?;
        log::debug!(
            "Applying Bernsen threshold: radius {}, contrast {}",
            self.radius,
            self.contrast
        );
        let element = square_element(self.radius)?;
        let mut local_min = buffer.clone();
        executor.apply_in_place(&mut local_min, &Morphology::erode(element.clone()))?;
        let mut local_max = buffer.clone();
        executor.apply_in_place(&mut local_max, &Morphology::dilate(element))?;

        let contrast = self.contrast;
        executor.map_in_place(buffer, |v, r, c, _| {
            let lo = local_min.get(r, c, 0);
            let hi = local_max.get(r, c, 0);
            let mid = (lo as u16 + hi as u16) as f32 / 2.0;
            let on = if hi.saturating_sub(lo) < contrast {
                mid >= 128.0
            } else {
                v as f32 > mid
            };
            Ok(if on { 255 } else { 0 })
        })
    }
}
