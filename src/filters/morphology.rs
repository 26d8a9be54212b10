//! Morphology filters: Dilate, Erode, Open, Close, Gradient, TopHat, BlackHat.
//!
//! Erosion takes the minimum of `sample - weight` over the structuring
//! element, dilation the maximum of `sample + weight`. Cells outside the
//! image are skipped. Compound operations run their passes one after the
//! other on the whole buffer.
//!
//! ## Supported Formats
//!
//! Grayscale and RGB; channels are processed independently.

use super::clamp_u8;
use crate::engine::{
    BorderPolicy, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
use crate::error::{FaultKind, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erode,
    Dilate,
}

/// Single erosion or dilation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    element: Window,
    op: MorphOp,
}

impl Morphology {
    /// Erosion: minimum of `sample - weight` over the element.
    ///
    /// # Arguments
    /// * `element` - Structuring element; flat windows ([`square_element`],
    ///   [`Window::disk`]) give a plain neighborhood minimum
    pub fn erode(element: Window) -> Self {
        Morphology {
            element,
            op: MorphOp::Erode,
        }
    }

    /// Dilation: maximum of `sample + weight` over the element.
    ///
    /// # Arguments
    /// * `element` - Structuring element; flat windows give a plain
    ///   neighborhood maximum
    pub fn dilate(element: Window) -> Self {
        Morphology {
            element,
            op: MorphOp::Dilate,
        }
    }

    pub fn op(&self) -> MorphOp {
        self.op
    }
}

/// Flat `(2r+1) x (2r+1)` structuring element.
///
/// # Arguments
/// * `radius` - Half side length, at most [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
///
/// # Returns
/// The element, or `InvalidParameter` for a radius above the limit
pub fn square_element(radius: usize) -> FilterResult<Window> {
    Window::square(radius)
}

impl WindowOperator for Morphology {
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
        let mut acc: Option<f32> = None;
        for cell in self.element.cells() {
            let sample = self.border().resolve(
                source,
                row as isize + cell.d_row,
                col as isize + cell.d_col,
                channel,
                (row, col),
            );
            let Some(v) = sample else { continue };
            let v = v as f32;
            acc = Some(match (self.op, acc) {
                (MorphOp::Erode, None) => v - cell.weight,
                (MorphOp::Erode, Some(a)) => a.min(v - cell.weight),
                (MorphOp::Dilate, None) => v + cell.weight,
                (MorphOp::Dilate, Some(a)) => a.max(v + cell.weight),
            });
        }
        // No member of the element landed inside the image.
        Ok(acc.map(clamp_u8).unwrap_or_else(|| source.get(row, col, channel)))
    }
}

impl Filter for Morphology {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!(
            "Applying {:?}: {} element cells",
            self.op,
            self.element.area()
        );
        executor.apply_in_place(buffer, self)
    }
}

// ============================================================================
// Compound operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    /// Erosion then dilation; removes bright features smaller than the element.
    Open,
    /// Dilation then erosion; fills dark gaps smaller than the element.
    Close,
    /// Dilation minus erosion.
    Gradient,
    /// Original minus opening.
    TopHat,
    /// Closing minus original.
    BlackHat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMorphology {
    erode: Morphology,
    dilate: Morphology,
    op: CompoundOp,
}

impl CompoundMorphology {
    /// # Arguments
    /// * `op` - Which combination of erosion and dilation to run
    /// * `element` - Structuring element shared by every pass
    pub fn new(op: CompoundOp, element: Window) -> Self {
        CompoundMorphology {
            erode: Morphology::erode(element.clone()),
            dilate: Morphology::dilate(element),
            op,
        }
    }

    pub fn open(element: Window) -> Self {
        Self::new(CompoundOp::Open, element)
    }

    pub fn close(element: Window) -> Self {
        Self::new(CompoundOp::Close, element)
    }

    fn opening(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        executor.apply_in_place(buffer, &self.erode)?;
        executor.apply_in_place(buffer, &self.dilate)
    }

    fn closing(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        executor.apply_in_place(buffer, &self.dilate)?;
        executor.apply_in_place(buffer, &self.erode)
    }
}

impl Filter for CompoundMorphology {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!("Applying {:?} morphology", self.op);
        match self.op {
            CompoundOp::Open => self.opening(executor, buffer),
            CompoundOp::Close => self.closing(executor, buffer),
            CompoundOp::Gradient => {
                let mut dilated = buffer.clone();
                executor.apply_in_place(&mut dilated, &self.dilate)?;
                executor.apply_in_place(buffer, &self.erode)?;
                executor.map_in_place(buffer, |eroded, r, c, ch| {
                    Ok(dilated.get(r, c, ch).saturating_sub(eroded))
                })
            }
            CompoundOp::TopHat => {
                let original = buffer.clone();
                self.opening(executor, buffer)?;
                executor.map_in_place(buffer, |opened, r, c, ch| {
                    Ok(original.get(r, c, ch).saturating_sub(opened))
                })
            }
            CompoundOp::BlackHat => {
                let original = buffer.clone();
                self.closing(executor, buffer)?;
                executor.map_in_place(buffer, |closed, r, c, ch| {
                    Ok(closed.saturating_sub(original.get(r, c, ch)))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelMode;
    use crate::error::FilterError;
    use ndarray::array;

    fn exec() -> ParallelFilterExecutor {
        ParallelFilterExecutor::with_workers(3)
    }

    fn spot(width: usize, height: usize, row: usize, col: usize) -> PixelBuffer {
        let mut img = PixelBuffer::new(width, height, ChannelMode::Gray);
        img.set(row, col, 0, 255);
        img
    }

    #[test]
    fn test_erode_removes_isolated_bright_pixel() {
        let mut img = spot(4, 4, 2, 2);
        Morphology::erode(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.as_raw(), vec![0; 16]);
    }

    #[test]
    fn test_dilate_grows_bright() {
        let mut img = spot(5, 5, 2, 2);
        Morphology::dilate(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        for r in 0..5 {
            for c in 0..5 {
                let inside = (1..=3).contains(&r) && (1..=3).contains(&c);
                assert_eq!(img.get(r, c, 0), if inside { 255 } else { 0 });
            }
        }
    }

    #[test]
    fn test_radius_zero_is_identity() {
        let src =
            PixelBuffer::from_fn(5, 4, ChannelMode::Rgb, |r, c, ch| (r * 50 + c * 3 + ch) as u8);
        for morph in [
            Morphology::erode(square_element(0).unwrap()),
            Morphology::dilate(square_element(0).unwrap()),
            Morphology::erode(Window::square(0).unwrap()),
            Morphology::dilate(Window::square(0).unwrap()),
        ] {
            let mut img = src.clone();
            morph.apply_with(&exec(), &mut img).unwrap();
            assert_eq!(img, src);
        }
    }

    #[test]
    fn test_square_window_does_not_shift_values() {
        let mut img = PixelBuffer::filled(4, 4, ChannelMode::Gray, 100);
        Morphology::erode(Window::square(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.as_raw(), vec![100; 16]);
        Morphology::dilate(Window::square(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.as_raw(), vec![100; 16]);
    }

    #[test]
    fn test_square_element_rejects_huge_radius() {
        for radius in [crate::engine::MAX_RADIUS + 1, 50_000, usize::MAX / 2 + 1] {
            assert!(matches!(
                square_element(radius),
                Err(FilterError::InvalidParameter { name: "radius", .. })
            ));
        }
    }

    #[test]
    fn test_erode_skips_outside_cells() {
        // A white image stays white: the outside is not treated as black.
        let mut img = PixelBuffer::filled(3, 3, ChannelMode::Gray, 255);
        Morphology::erode(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.as_raw(), vec![255; 9]);
    }

    #[test]
    fn test_weighted_element() {
        let element =
            Window::structuring_element(&array![[-1, 10, -1], [10, 0, 10], [-1, 10, -1]]).unwrap();
        let mut img = PixelBuffer::filled(3, 3, ChannelMode::Gray, 100);
        Morphology::dilate(element.clone()).apply_with(&exec(), &mut img).unwrap();
        assert_eq!(img.get(1, 1, 0), 110);

        let mut img = PixelBuffer::filled(3, 3, ChannelMode::Gray, 5);
        Morphology::erode(element).apply_with(&exec(), &mut img).unwrap();
        assert_eq!(img.get(1, 1, 0), 0);
    }

    #[test]
    fn test_open_removes_small_bright() {
        let mut img = spot(7, 7, 3, 3);
        CompoundMorphology::open(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.as_raw(), vec![0; 49]);
    }

    #[test]
    fn test_close_leaves_background_alone() {
        let src = spot(7, 7, 3, 3);
        let mut img = src.clone();
        CompoundMorphology::close(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img, src);
    }

    #[test]
    fn test_close_fills_small_dark() {
        let mut img = PixelBuffer::filled(7, 7, ChannelMode::Gray, 200);
        img.set(3, 3, 0, 0);
        CompoundMorphology::close(square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.get(3, 3, 0), 200);
    }

    #[test]
    fn test_gradient_flat_is_zero_and_edge_is_not() {
        let mut flat = PixelBuffer::filled(4, 4, ChannelMode::Gray, 90);
        CompoundMorphology::new(CompoundOp::Gradient, square_element(1).unwrap())
            .apply_with(&exec(), &mut flat)
            .unwrap();
        assert_eq!(flat.as_raw(), vec![0; 16]);

        let mut step =
            PixelBuffer::from_fn(6, 3, ChannelMode::Gray, |_, c, _| if c < 3 { 0 } else { 200 });
        CompoundMorphology::new(CompoundOp::Gradient, square_element(1).unwrap())
            .apply_with(&exec(), &mut step)
            .unwrap();
        assert_eq!(step.get(1, 2, 0), 200);
        assert_eq!(step.get(1, 0, 0), 0);
    }

    #[test]
    fn test_tophat_extracts_small_bright() {
        let mut img = PixelBuffer::filled(7, 7, ChannelMode::Gray, 40);
        img.set(3, 3, 0, 240);
        CompoundMorphology::new(CompoundOp::TopHat, square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.get(3, 3, 0), 200);
        assert_eq!(img.get(0, 0, 0), 0);
    }

    #[test]
    fn test_blackhat_extracts_small_dark() {
        let mut img = PixelBuffer::filled(7, 7, ChannelMode::Gray, 180);
        img.set(3, 3, 0, 30);
        CompoundMorphology::new(CompoundOp::BlackHat, square_element(1).unwrap())
            .apply_with(&exec(), &mut img)
            .unwrap();
        assert_eq!(img.get(3, 3, 0), 150);
        assert_eq!(img.get(6, 6, 0), 0);
    }
}
