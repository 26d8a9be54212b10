//! Window operators and the filters built on them.
//!
//! ## Supported Formats
//!
//! | Mode | Shape | Description |
//! |------|-------|-------------|
//! | Gray | (H, W, 1) | Single luminance channel, 0-255 |
//! | Rgb  | (H, W, 3) | Red, green, blue, 0-255 |
//!
//! ## Filter Categories
//!
//! - **Convolution**: box, gaussian, sharpen, custom kernels (all modes)
//! - **Rank**: median, rank select, alpha-trimmed mean (all modes)
//! - **Morphology**: dilate, erode, open, close, gradient, top/black hat (all modes)
//! - **Statistics**: local mean and variance, global histogram (all modes)
//! - **Threshold**: fixed, Otsu, SIS, Niblack, Sauvola, Bernsen (gray only)
//! - **Edge detection**: Sobel, Prewitt, Laplacian (gray only)
//! - **Grayscale**: RGB to gray conversion

pub mod core;
pub mod convolution;
pub mod rank;
pub mod morphology;
pub mod statistics;
pub mod threshold;
pub mod edge;
pub mod grayscale;

/// Round to nearest and clamp to the 8-bit range.
#[inline]
pub(crate) fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
