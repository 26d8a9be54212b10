//! Kernel presets shared by the convolution and edge filters.
//!
//! All kernels are `Array2<f32>` with odd dimensions, ready for
//! [`Window::from_kernel`](crate::engine::Window::from_kernel).

use ndarray::{array, Array2};

use crate::engine::window::check_radius;
use crate::error::FilterResult;

/// Generate a 1D Gaussian kernel.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
///
/// # Returns
/// Normalized 1D kernel as Vec<f32>
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || !sigma.is_finite() {
        return vec![1.0];
    }

    let half = gaussian_radius(sigma);
    let kernel_size = 2 * half + 1;

    let mut kernel: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let x = i as f32 - half as f32;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}

/// Half width of the Gaussian kernel for `sigma`, without building it.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
///
/// # Returns
/// 0 for a non-positive or non-finite sigma, otherwise half of the odd
/// size covering 6 sigma
pub fn gaussian_radius(sigma: f32) -> usize {
    if sigma <= 0.0 || !sigma.is_finite() {
        return 0;
    }
    // Kernel size = 6 sigma (covers 99.7% of distribution), ensure odd
    (((sigma * 6.0).ceil() as usize) | 1) / 2
}

/// Generate a 2D Gaussian kernel as the outer product of two 1D kernels.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
///
/// # Returns
/// Normalized square kernel of side `2 * gaussian_radius(sigma) + 1`
pub fn gaussian_kernel_2d(sigma: f32) -> Array2<f32> {
    let k1d = gaussian_kernel_1d(sigma);
    let size = k1d.len();
    Array2::from_shape_fn((size, size), |(y, x)| k1d[y] * k1d[x])
}

/// `(2r+1) x (2r+1)` kernel of ones.
///
/// # Arguments
/// * `radius` - Half side length, at most [`MAX_RADIUS`](crate::engine::MAX_RADIUS)
///
/// # Returns
/// The kernel, or `InvalidParameter` before anything is allocated when
/// the radius is above the limit
pub fn box_kernel(radius: usize) -> FilterResult<Array2<f32>> {
    check_radius(radius)?;
    let size = 2 * radius + 1;
    Ok(Array2::ones((size, size)))
}

/// Horizontal Sobel gradient.
pub fn sobel_x() -> Array2<f32> {
    array![[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]]
}

/// Vertical Sobel gradient.
pub fn sobel_y() -> Array2<f32> {
    array![[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]]
}

/// Horizontal Prewitt gradient; unweighted rows.
pub fn prewitt_x() -> Array2<f32> {
    array![[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]]
}

/// Vertical Prewitt gradient.
pub fn prewitt_y() -> Array2<f32> {
    array![[-1.0, -1.0, -1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]
}

/// 4-neighbor Laplacian.
pub fn laplacian_3() -> Array2<f32> {
    array![[0.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 0.0]]
}

/// 5x5 Laplacian with a stronger center; less sensitive to single-pixel noise.
pub fn laplacian_5() -> Array2<f32> {
    array![
        [0.0, 0.0, -1.0, 0.0, 0.0],
        [0.0, -1.0, -2.0, -1.0, 0.0],
        [-1.0, -2.0, 16.0, -2.0, -1.0],
        [0.0, -1.0, -2.0, -1.0, 0.0],
        [0.0, 0.0, -1.0, 0.0, 0.0],
    ]
}

/// 3x3 sharpen; weights sum to 1.
pub fn sharpen() -> Array2<f32> {
    array![[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_1d_normalized_and_odd() {
        let k = gaussian_kernel_1d(1.5);
        assert_eq!(k.len() % 2, 1);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[k.len() / 2] > k[0]);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_identity() {
        assert_eq!(gaussian_kernel_1d(0.0), vec![1.0]);
        assert_eq!(gaussian_kernel_2d(0.0).dim(), (1, 1));
    }

    #[test]
    fn test_gaussian_2d_sums_to_one() {
        let k = gaussian_kernel_2d(1.0);
        assert!((k.sum() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_gradient_kernels_sum_to_zero() {
        let kernels = [
            sobel_x(),
            sobel_y(),
            prewitt_x(),
            prewitt_y(),
            laplacian_3(),
            laplacian_5(),
        ];
        for k in kernels {
            assert_eq!(k.sum(), 0.0);
        }
        assert_eq!(sharpen().sum(), 1.0);
        assert_eq!(box_kernel(2).unwrap().sum(), 25.0);
    }

    #[test]
    fn test_box_kernel_rejects_huge_radius() {
        use crate::error::FilterError;
        for radius in [50_000, usize::MAX / 2 + 1] {
            assert!(matches!(
                box_kernel(radius),
                Err(FilterError::InvalidParameter { name: "radius", .. })
            ));
        }
    }

    #[test]
    fn test_gaussian_radius_matches_kernel() {
        assert_eq!(gaussian_radius(0.0), 0);
        assert_eq!(gaussian_radius(1.0), 3);
        assert_eq!(gaussian_kernel_1d(1.5).len(), 2 * gaussian_radius(1.5) + 1);
    }
}
