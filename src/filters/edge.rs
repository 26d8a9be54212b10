//! Edge detection filters: Sobel, Prewitt, Laplacian.
//!
//! Gradient operators output `sqrt(gx^2 + gy^2)`; the Laplacian outputs the
//! absolute response. Out-of-range cells replicate the nearest edge pixel so
//! the image border does not read as an edge. Results are clamped to 0-255.
//!
//! ## Supported Formats
//!
//! Grayscale only. Convert RGB input with
//! [`Grayscale`](super::grayscale::Grayscale) first.

use super::clamp_u8;
use super::core::{laplacian_3, laplacian_5, prewitt_x, prewitt_y, sobel_x, sobel_y};
use crate::engine::{
    BorderPolicy, ChannelMode, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
use crate::error::{FaultKind, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Sobel,
    Prewitt,
    /// 3x3 four-neighbor Laplacian.
    Laplacian,
    /// 5x5 Laplacian.
    LaplacianWide,
}

/// Gradient or Laplacian edge filter over a grayscale image.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDetect {
    kind: EdgeKind,
    x: Window,
    y: Option<Window>,
}

impl EdgeDetect {
    /// Build the filter from the kernel presets in [`core`](super::core).
    ///
    /// # Arguments
    /// * `kind` - Which operator to run
    ///
    /// # Returns
    /// The filter; the presets are always valid windows
    pub fn new(kind: EdgeKind) -> FilterResult<Self> {
        let (x, y) = match kind {
            EdgeKind::Sobel => (sobel_x(), Some(sobel_y())),
            EdgeKind::Prewitt => (prewitt_x(), Some(prewitt_y())),
            EdgeKind::Laplacian => (laplacian_3(), None),
            EdgeKind::LaplacianWide => (laplacian_5(), None),
        };
        Ok(EdgeDetect {
            kind,
            x: Window::from_kernel(&x)?,
            y: y.as_ref().map(Window::from_kernel).transpose()?,
        })
    }

    /// Sobel gradient magnitude.
    pub fn sobel() -> FilterResult<Self> {
        Self::new(EdgeKind::Sobel)
    }

    pub fn prewitt() -> FilterResult<Self> {
        Self::new(EdgeKind::Prewitt)
    }

    pub fn laplacian() -> FilterResult<Self> {
        Self::new(EdgeKind::Laplacian)
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    fn response(
        &self,
        window: &Window,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> f32 {
        window
            .cells()
            .iter()
            .filter_map(|cell| {
                self.border()
                    .resolve(
                        source,
                        row as isize + cell.d_row,
                        col as isize + cell.d_col,
                        channel,
                        (row, col),
                    )
                    .map(|v| cell.weight * v as f32)
            })
            .sum()
    }
}

impl WindowOperator for EdgeDetect {
    type Output = u8;

    fn border(&self) -> BorderPolicy {
        BorderPolicy::Replicate
    }

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<u8, FaultKind> {
        let gx = self.response(&self.x, source, row, col, channel);
        let value = match &self.y {
            Some(y) => gx.hypot(self.response(y, source, row, col, channel)),
            None => gx.abs(),
        };
        if !value.is_finite() {
            return Err(FaultKind::NonFinite(value));
        }
        Ok(clamp_u8(value))
    }
}

impl Filter for EdgeDetect {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("edge detection", ChannelMode::Gray)?;
        log::debug!("Applying {:?} edge detection", self.kind);
        executor.apply_in_place(buffer, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;

    fn exec() -> ParallelFilterExecutor {
        ParallelFilterExecutor::with_workers(2)
    }

    fn step(width: usize, height: usize, high: u8) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, ChannelMode::Gray, |_, c, _| {
            if c < 3 {
                0
            } else {
                high
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let kinds = [
            EdgeKind::Sobel,
            EdgeKind::Prewitt,
            EdgeKind::Laplacian,
            EdgeKind::LaplacianWide,
        ];
        for kind in kinds {
            let mut img = PixelBuffer::filled(6, 6, ChannelMode::Gray, 140);
            EdgeDetect::new(kind).unwrap().apply_with(&exec(), &mut img).unwrap();
            assert_eq!(img.as_raw(), vec![0; 36], "{:?}", kind);
        }
    }

    #[test]
    fn test_sobel_vertical_step() {
        let mut img = step(6, 4, 20);
        EdgeDetect::sobel().unwrap().apply_with(&exec(), &mut img).unwrap();
        // Columns either side of the step see a 20-unit jump times 4.
        assert_eq!(img.get(1, 2, 0), 80);
        assert_eq!(img.get(1, 3, 0), 80);
        // Replicated border stays quiet, including the top and bottom rows.
        assert_eq!(img.get(0, 0, 0), 0);
        assert_eq!(img.get(3, 5, 0), 0);
        assert_eq!(img.get(0, 2, 0), 80);
    }

    #[test]
    fn test_prewitt_vertical_step() {
        let mut img = step(6, 4, 20);
        EdgeDetect::prewitt().unwrap().apply_with(&exec(), &mut img).unwrap();
        assert_eq!(img.get(2, 2, 0), 60);
        assert_eq!(img.get(2, 1, 0), 0);
    }

    #[test]
    fn test_laplacian_is_absolute() {
        let mut img = step(6, 3, 50);
        EdgeDetect::laplacian().unwrap().apply_with(&exec(), &mut img).unwrap();
        // Dark side: 4*0 - 50 = -50; bright side: 4*50 - 3*50 = 50.
        assert_eq!(img.get(1, 2, 0), 50);
        assert_eq!(img.get(1, 3, 0), 50);
        assert_eq!(img.get(1, 0, 0), 0);
    }

    #[test]
    fn test_strong_edges_clamp() {
        let mut img = step(6, 4, 255);
        EdgeDetect::sobel().unwrap().apply_with(&exec(), &mut img).unwrap();
        assert_eq!(img.get(1, 2, 0), 255);
    }

    #[test]
    fn test_rejects_rgb() {
        let mut img = PixelBuffer::new(4, 4, ChannelMode::Rgb);
        let err = EdgeDetect::sobel().unwrap().apply_with(&exec(), &mut img).unwrap_err();
        assert!(matches!(err, FilterError::InvalidMode { .. }));
    }
}
