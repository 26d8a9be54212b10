//! Window shapes: the neighbor offsets an operator visits per pixel.

use ndarray::Array2;

use crate::error::{FilterError, FilterResult};

/// Largest radius accepted by the window constructors.
pub const MAX_RADIUS: usize = 64;

/// One visited offset and its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowCell {
    pub d_row: isize,
    pub d_col: isize,
    pub weight: f32,
}

/// Immutable set of offsets shared by all workers of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    cells: Vec<WindowCell>,
    radius: usize,
}

impl Window {
    /// Full `(2r+1) x (2r+1)` square, every weight 0.
    ///
    /// Flat like [`disk`](Self::disk), so it can also serve as a
    /// structuring element without shifting values.
    ///
    /// # Arguments
    /// * `radius` - Half side length, at most [`MAX_RADIUS`]
    ///
    /// # Returns
    /// The window, or `InvalidParameter` for a radius above the limit
    pub fn square(radius: usize) -> FilterResult<Self> {
        check_radius(radius)?;
        let r = radius as isize;
        let cells = (-r..=r)
            .flat_map(|d_row| {
                (-r..=r).map(move |d_col| WindowCell {
                    d_row,
                    d_col,
                    weight: 0.0,
                })
            })
            .collect();
        Ok(Window { cells, radius })
    }

    /// Circular element: offsets with `dx^2 + dy^2 <= radius^2`, weight 0.
    pub fn disk(radius: f32) -> FilterResult<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(FilterError::invalid(
                "radius",
                format!("must be a non-negative number, got {}", radius),
            ));
        }
        let r_ceil = radius.ceil() as usize;
        check_radius(r_ceil)?;
        let r = r_ceil as isize;
        let r_sq = radius * radius;
        let mut cells = Vec::new();
        for d_row in -r..=r {
            for d_col in -r..=r {
                if (d_row * d_row + d_col * d_col) as f32 <= r_sq {
                    cells.push(WindowCell {
                        d_row,
                        d_col,
                        weight: 0.0,
                    });
                }
            }
        }
        Ok(Window {
            cells,
            radius: r_ceil,
        })
    }

    /// Convolution kernel. Dimensions must be odd and weights finite; the
    /// center of the matrix sits on the pixel being computed.
    pub fn from_kernel(kernel: &Array2<f32>) -> FilterResult<Self> {
        let (rows, cols) = kernel.dim();
        check_odd_dims(rows, cols)?;
        if let Some(bad) = kernel.iter().find(|w| !w.is_finite()) {
            return Err(FilterError::invalid(
                "kernel",
                format!("weights must be finite, found {}", bad),
            ));
        }
        let (cy, cx) = ((rows / 2) as isize, (cols / 2) as isize);
        let cells = kernel
            .indexed_iter()
            .map(|((y, x), &weight)| WindowCell {
                d_row: y as isize - cy,
                d_col: x as isize - cx,
                weight,
            })
            .collect();
        Ok(Window {
            cells,
            radius: rows.max(cols) / 2,
        })
    }

    /// Morphological structuring element. Negative entries are not part of
    /// the element; other entries are additive weights (0 for a flat element).
    pub fn structuring_element(element: &Array2<i32>) -> FilterResult<Self> {
        let (rows, cols) = element.dim();
        check_odd_dims(rows, cols)?;
        let (cy, cx) = ((rows / 2) as isize, (cols / 2) as isize);
        let cells: Vec<_> = element
            .indexed_iter()
            .filter(|(_, w)| **w >= 0)
            .map(|((y, x), &w)| WindowCell {
                d_row: y as isize - cy,
                d_col: x as isize - cx,
                weight: w as f32,
            })
            .collect();
        if cells.is_empty() {
            return Err(FilterError::invalid(
                "structuring_element",
                "has no members",
            ));
        }
        Ok(Window {
            cells,
            radius: rows.max(cols) / 2,
        })
    }

    pub fn cells(&self) -> &[WindowCell] {
        &self.cells
    }

    /// Number of visited offsets.
    pub fn area(&self) -> usize {
        self.cells.len()
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Sum of all weights.
    pub fn weight_sum(&self) -> f32 {
        self.cells.iter().map(|c| c.weight).sum()
    }
}

/// Reject radii above [`MAX_RADIUS`] before anything sized by them is built.
pub(crate) fn check_radius(radius: usize) -> FilterResult<()> {
    if radius > MAX_RADIUS {
        return Err(FilterError::invalid(
            "radius",
            format!("{} exceeds the maximum of {}", radius, MAX_RADIUS),
        ));
    }
    Ok(())
}

fn check_odd_dims(rows: usize, cols: usize) -> FilterResult<()> {
    if rows % 2 == 0 || cols % 2 == 0 {
        return Err(FilterError::invalid(
            "kernel",
            format!("dimensions must be odd, got {}x{}", rows, cols),
        ));
    }
    check_radius(rows.max(cols) / 2)
}
