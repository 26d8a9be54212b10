//! Owned pixel storage.
//!
//! Samples are stored as `(height, width, channels)` in an [`Array3`],
//! the same layout the rest of ImageStag uses. Rows are the outer axis so a
//! contiguous run of rows can be split off and handed to one worker.

use std::fmt;

use ndarray::{Array3, ArrayView3, ArrayViewMut3};

use crate::error::{FilterError, FilterResult};

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Gray,
    Rgb,
}

impl ChannelMode {
    pub fn channels(self) -> usize {
        match self {
            ChannelMode::Gray => 1,
            ChannelMode::Rgb => 3,
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Gray => f.write_str("gray"),
            ChannelMode::Rgb => f.write_str("rgb"),
        }
    }
}

/// A 2D grid of 8-bit samples, one or three per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Array3<u8>,
    mode: ChannelMode,
}

impl PixelBuffer {
    /// Black buffer of the given shape.
    pub fn new(width: usize, height: usize, mode: ChannelMode) -> Self {
        Self::filled(width, height, mode, 0)
    }

    /// Buffer with every sample set to `value`.
    pub fn filled(width: usize, height: usize, mode: ChannelMode, value: u8) -> Self {
        PixelBuffer {
            data: Array3::from_elem((height, width, mode.channels()), value),
            mode,
        }
    }

    /// Wrap interleaved row-major samples.
    ///
    /// # Arguments
    /// * `width`, `height` - Image dimensions in pixels
    /// * `mode` - Channel layout of `samples`
    /// * `samples` - `height * width * channels` values
    ///
    /// # Returns
    /// The buffer, or `ShapeMismatch` when the sample count is wrong
    pub fn from_raw(
        width: usize,
        height: usize,
        mode: ChannelMode,
        samples: Vec<u8>,
    ) -> FilterResult<Self> {
        let expected = width * height * mode.channels();
        if samples.len() != expected {
            return Err(FilterError::ShapeMismatch {
                width,
                height,
                mode,
                expected,
                actual: samples.len(),
            });
        }
        let data = Array3::from_shape_vec((height, width, mode.channels()), samples).map_err(
            |_| FilterError::ShapeMismatch {
                width,
                height,
                mode,
                expected,
                actual: expected,
            },
        )?;
        Ok(PixelBuffer { data, mode })
    }

    /// Build a buffer by evaluating `f(row, col, channel)` for every sample.
    pub fn from_fn<F>(width: usize, height: usize, mode: ChannelMode, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> u8,
    {
        PixelBuffer {
            data: Array3::from_shape_fn((height, width, mode.channels()), |(r, c, ch)| {
                f(r, c, ch)
            }),
            mode,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    #[inline]
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.mode.channels()
    }

    /// Sample at `(row, col, channel)`. Panics when out of range; loop
    /// bounds in the engine keep every call in range.
    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> u8 {
        self.data[[row, col, channel]]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: u8) {
        self.data[[row, col, channel]] = value;
    }

    /// Bounds-checked read with signed coordinates.
    #[inline]
    pub fn try_get(&self, row: isize, col: isize, channel: usize) -> Option<u8> {
        if row < 0 || col < 0 {
            return None;
        }
        self.data.get([row as usize, col as usize, channel]).copied()
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    pub(crate) fn view_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        self.data.view_mut()
    }

    /// Interleaved samples in row-major order.
    pub fn as_raw(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn into_raw(self) -> Vec<u8> {
        let (raw, _) = self.data.into_raw_vec_and_offset();
        raw
    }

    /// Fail with [`FilterError::InvalidMode`] unless the buffer is in `expected` mode.
    pub fn require_mode(&self, filter: &'static str, expected: ChannelMode) -> FilterResult<()> {
        if self.mode != expected {
            return Err(FilterError::InvalidMode {
                filter,
                expected,
                actual: self.mode,
            });
        }
        Ok(())
    }
}

/// Per-pixel intermediate results (local mean, variance, min, max, ...).
///
/// Filled completely by one windowed pass, then read-only for the rest of
/// the filter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryStatsBuffer {
    data: Array3<f32>,
}

impl AuxiliaryStatsBuffer {
    pub(crate) fn from_array(data: Array3<f32>) -> Self {
        AuxiliaryStatsBuffer { data }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.data[[row, col, channel]]
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Display variant: rounded and clamped to 0-255.
    pub fn to_pixel_buffer(&self, mode: ChannelMode) -> FilterResult<PixelBuffer> {
        let samples = self
            .data
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        PixelBuffer::from_raw(self.width(), self.height(), mode, samples)
    }
}
