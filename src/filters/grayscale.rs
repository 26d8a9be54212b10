//! Grayscale conversion filter.
//!
//! Uses ITU-R BT.709 luminosity coefficients unless custom weights are
//! given. The RGB buffer is replaced by a single-channel one of the same
//! dimensions.

use super::clamp_u8;
use crate::engine::{ChannelMode, Filter, ParallelFilterExecutor, PixelBuffer};
use crate::error::{FilterError, FilterResult};

/// ITU-R BT.709 luminosity coefficients
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Channel weights, normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrayscaleWeights {
    r: f32,
    g: f32,
    b: f32,
}

impl Default for GrayscaleWeights {
    fn default() -> Self {
        GrayscaleWeights {
            r: LUMA_R,
            g: LUMA_G,
            b: LUMA_B,
        }
    }
}

impl GrayscaleWeights {
    /// Custom weights, normalized by their sum.
    ///
    /// # Arguments
    /// * `r`, `g`, `b` - Non-negative channel weights with a positive sum
    ///
    /// # Returns
    /// The normalized weights, or `InvalidParameter` named `weights`
    pub fn new(r: f32, g: f32, b: f32) -> FilterResult<Self> {
        let sum = r + g + b;
        if [r, g, b].iter().any(|w| !w.is_finite() || *w < 0.0) || sum <= 0.0 {
            return Err(FilterError::invalid(
                "weights",
                format!("need non-negative weights with a positive sum, got ({}, {}, {})", r, g, b),
            ));
        }
        Ok(GrayscaleWeights {
            r: r / sum,
            g: g / sum,
            b: b / sum,
        })
    }

    /// Unweighted average of the three channels.
    pub fn average() -> Self {
        GrayscaleWeights {
            r: 1.0 / 3.0,
            g: 1.0 / 3.0,
            b: 1.0 / 3.0,
        }
    }

    /// Weighted sum of one RGB pixel, rounded to 0-255.
    pub fn luma(&self, r: u8, g: u8, b: u8) -> u8 {
        clamp_u8(self.r * r as f32 + self.g * g as f32 + self.b * b as f32)
    }
}

/// RGB to gray conversion. The buffer is replaced by a new Gray buffer of
/// the same width and height; Gray input is rejected with `InvalidMode`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Grayscale {
    weights: GrayscaleWeights,
}

impl Grayscale {
    pub fn new(weights: GrayscaleWeights) -> Self {
        Grayscale { weights }
    }

    pub fn weights(&self) -> GrayscaleWeights {
        self.weights
    }
}

impl Filter for Grayscale {
    fn apply_with(
        &self,
        executor: &ParallelFilterExecutor,
        buffer: &mut PixelBuffer,
    ) -> FilterResult<()> {
        buffer.require_mode("grayscale", ChannelMode::Rgb)?;
        log::debug!("Converting {}x{} to grayscale", buffer.width(), buffer.height());
        let weights = self.weights;
        let gray = executor.map_into(buffer, ChannelMode::Gray, |src, row, col, _| {
            Ok(weights.luma(src.get(row, col, 0), src.get(row, col, 1), src.get(row, col, 2)))
        })?;
        *buffer = gray;
        Ok(())
    }
}
