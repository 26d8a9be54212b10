//! Weighted-sum convolution: blur, sharpen and custom kernels.
//!
//! ## Supported Formats
//!
//! Grayscale and RGB; every channel is convolved independently.

use ndarray::Array2;

use super::clamp_u8;
use super::core::{box_kernel, gaussian_kernel_2d, gaussian_radius, sharpen};
use crate::engine::window::check_radius;
use crate::engine::{
    BorderPolicy, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
use crate::error::{FaultKind, FilterError, FilterResult};

/// What the weighted sum is divided by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Divisor {
    /// Sum of the weights that actually contributed (1 if that sum is 0).
    Auto,
    /// Explicit non-zero divisor.
    Fixed(f32),
}

/// `sum(kernel[i][j] * sample) / divisor`, clamped to 0-255.
#[derive(Debug, Clone, PartialEq)]
pub struct Convolution {
    window: Window,
    divisor: Divisor,
    replicate: bool,
}

impl Convolution {
    /// Convolution with an automatic divisor. Out-of-range cells are skipped
    /// until [`replicate`](Self::replicate) is set.
    ///
    /// # Arguments
    /// * `kernel` - Weights with odd dimensions; the center sits on the pixel
    ///
    /// # Returns
    /// The filter, or `InvalidParameter` for even, oversized or non-finite kernels
    pub fn new(kernel: &Array2<f32>) -> FilterResult<Self> {
        Ok(Convolution {
            window: Window::from_kernel(kernel)?,
            divisor: Divisor::Auto,
            replicate: false,
        })
    }

    /// Box blur of the given radius, edges replicated.
    ///
    /// # Arguments
    /// * `radius` - Half side of the box, at most [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    pub fn box_blur(radius: usize) -> FilterResult<Self> {
        Ok(Self::new(&box_kernel(radius)?)?.replicate(true))
    }

    /// Gaussian blur, edges replicated.
    ///
    /// # Arguments
    /// * `sigma` - Standard deviation; 0 gives the identity. The kernel
    ///   radius `ceil(6 * sigma) / 2` must not exceed
    ///   [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
    pub fn gaussian(sigma: f32) -> FilterResult<Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(FilterError::invalid(
                "sigma",
                format!("must be a non-negative number, got {}", sigma),
            ));
        }
        check_radius(gaussian_radius(sigma))?;
        Ok(Self::new(&gaussian_kernel_2d(sigma))?.replicate(true))
    }

    /// 3x3 sharpen, edges replicated.
    pub fn sharpen() -> FilterResult<Self> {
        Ok(Self::new(&sharpen())?.replicate(true))
    }

    /// Divide by `divisor` instead of the contributing weight sum.
    ///
    /// # Returns
    /// The updated filter, or `InvalidParameter` for 0 or a non-finite value
    pub fn with_divisor(mut self, divisor: f32) -> FilterResult<Self> {
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(FilterError::invalid(
                "divisor",
                format!("must be finite and non-zero, got {}", divisor),
            ));
        }
        self.divisor = Divisor::Fixed(divisor);
        Ok(self)
    }

    /// Clamp out-of-range cells to the nearest edge pixel instead of skipping.
    pub fn replicate(mut self, replicate: bool) -> Self {
        self.replicate = replicate;
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn divisor(&self) -> Divisor {
        self.divisor
    }
}

impl WindowOperator for Convolution {
    type Output = u8;

    fn border(&self) -> BorderPolicy {
        if self.replicate {
            BorderPolicy::Replicate
        } else {
            BorderPolicy::Skip
        }
    }

    fn compute(
        &self,
        source: &PixelBuffer,
        row: usize,
        col: usize,
        channel: usize,
    ) -> Result<u8, FaultKind> {
        let border = self.border();
        let mut sum = 0.0f32;
        let mut contributing = 0.0f32;
        for cell in self.window.cells() {
            let sample = border.resolve(
                source,
                row as isize + cell.d_row,
                col as isize + cell.d_col,
                channel,
                (row, col),
            );
            if let Some(v) = sample {
                sum += cell.weight * v as f32;
                contributing += cell.weight;
            }
        }

        let divisor = match self.divisor {
            Divisor::Fixed(d) => d,
            Divisor::Auto if contributing == 0.0 => 1.0,
            Divisor::Auto => contributing,
        };
        let value = sum / divisor;
        if !value.is_finite() {
            return Err(FaultKind::NonFinite(value));
        }
        Ok(clamp_u8(value))
    }
}

impl Filter for Convolution {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        log::debug!(
            "Applying convolution: {} cells, divisor {:?}, border {:?}",
            self.window.area(),
            self.divisor,
            self.border()
        );
        executor.apply_in_place(buffer, self)
    }
}
