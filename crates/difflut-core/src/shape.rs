//! Tensor shapes and flat addressing.
//!
//! Both tensors are dense and row-major over their logical axes:
//!
//! ```text
//! Grid        (3, D, D, D)   index = c*D^3 + r*D^2 + g*D + b
//! ImageBatch  (N, C, W, H)   index = ((n*C + c)*W + x)*H + y
//! ```
//!
//! Image batches are planar: all of channel 0 for an image, then all of
//! channel 1, and so on. A pixel's channels are therefore `W*H` apart.

use std::fmt;

use crate::{Error, Result, MIN_GRID_DIM};

/// Number of color channels the LUT operates on.
pub const RGB_CHANNELS: usize = 3;

/// Shape of an image batch: `(N, C, W, H)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchShape {
    /// Number of images
    pub batch: usize,
    /// Channels per image
    pub channels: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl BatchShape {
    /// Creates a batch shape.
    #[inline]
    pub const fn new(batch: usize, channels: usize, width: usize, height: usize) -> Self {
        Self {
            batch,
            channels,
            width,
            height,
        }
    }

    /// Creates an RGB batch shape.
    #[inline]
    pub const fn rgb(batch: usize, width: usize, height: usize) -> Self {
        Self::new(batch, RGB_CHANNELS, width, height)
    }

    /// Pixels in one channel plane (`W * H`).
    #[inline]
    pub const fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// Values in one image (`C * W * H`).
    #[inline]
    pub const fn image_len(&self) -> usize {
        self.channels * self.plane_len()
    }

    /// Total number of values (`N * C * W * H`).
    #[inline]
    pub const fn len(&self) -> usize {
        self.batch * self.image_len()
    }

    /// Returns `true` when the batch holds no values.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total pixel count across the batch (`N * W * H`).
    #[inline]
    pub const fn pixel_count(&self) -> usize {
        self.batch * self.plane_len()
    }

    /// Flat offset of `(n, c, x, y)`.
    #[inline]
    pub const fn index(&self, n: usize, c: usize, x: usize, y: usize) -> usize {
        ((n * self.channels + c) * self.width + x) * self.height + y
    }

    /// Total value count, or `None` on overflow.
    pub fn checked_len(&self) -> Option<usize> {
        self.batch
            .checked_mul(self.channels)?
            .checked_mul(self.width)?
            .checked_mul(self.height)
    }
}

impl fmt::Display for BatchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.width, self.height
        )
    }
}

/// Shape of a LUT grid: `(3, D, D, D)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    /// Vertices per axis
    pub dim: usize,
}

impl GridShape {
    /// Creates a grid shape with `dim` vertices per axis.
    #[inline]
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Creates a grid shape, rejecting dimensions below [`MIN_GRID_DIM`] or
    /// whose value count does not fit in `usize`.
    pub fn validated(dim: usize) -> Result<Self> {
        if dim < MIN_GRID_DIM {
            return Err(Error::invalid_shape(
                "grid",
                format!("dimension {dim} is below {MIN_GRID_DIM}"),
            ));
        }
        let shape = Self::new(dim);
        shape
            .checked_len()
            .ok_or_else(|| Error::invalid_shape("grid", format!("dimension {dim} overflows")))?;
        Ok(shape)
    }

    /// Total value count, or `None` on overflow.
    pub fn checked_len(&self) -> Option<usize> {
        self.dim
            .checked_mul(self.dim)?
            .checked_mul(self.dim)?
            .checked_mul(RGB_CHANNELS)
    }

    /// Vertices in one channel sub-grid (`D^3`).
    ///
    /// This is the stride between output-channel blocks.
    #[inline]
    pub const fn shift(&self) -> usize {
        self.dim * self.dim * self.dim
    }

    /// Total value count (`3 * D^3`).
    #[inline]
    pub const fn len(&self) -> usize {
        RGB_CHANNELS * self.shift()
    }

    /// Returns `true` for a zero-sized grid.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.dim == 0
    }

    /// Flat vertex offset of `(r, g, b)` within one channel sub-grid.
    #[inline]
    pub const fn vertex(&self, r: usize, g: usize, b: usize) -> usize {
        (r * self.dim + g) * self.dim + b
    }

    /// Flat offset of `(c, r, g, b)`.
    #[inline]
    pub const fn index(&self, c: usize, r: usize, g: usize, b: usize) -> usize {
        c * self.shift() + self.vertex(r, g, b)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", RGB_CHANNELS, self.dim, self.dim, self.dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_index_is_planar() {
        let shape = BatchShape::rgb(2, 4, 5);
        assert_eq!(shape.plane_len(), 20);
        assert_eq!(shape.image_len(), 60);
        assert_eq!(shape.len(), 120);
        assert_eq!(shape.index(0, 0, 0, 1), 1);
        assert_eq!(shape.index(0, 0, 1, 0), 5);
        assert_eq!(shape.index(0, 1, 0, 0), 20);
        assert_eq!(shape.index(1, 0, 0, 0), 60);
        assert_eq!(shape.index(1, 2, 3, 4), 119);
    }

    #[test]
    fn test_grid_index() {
        let shape = GridShape::new(17);
        assert_eq!(shape.shift(), 4913);
        assert_eq!(shape.len(), 3 * 4913);
        assert_eq!(shape.index(0, 0, 0, 1), 1);
        assert_eq!(shape.index(0, 0, 1, 0), 17);
        assert_eq!(shape.index(0, 1, 0, 0), 289);
        assert_eq!(shape.index(2, 16, 16, 16), shape.len() - 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(BatchShape::rgb(10, 4, 4).to_string(), "(10, 3, 4, 4)");
        assert_eq!(GridShape::new(33).to_string(), "(3, 33, 33, 33)");
    }

    #[test]
    fn test_validated_grid_shape() {
        assert_eq!(GridShape::validated(17).unwrap(), GridShape::new(17));
        assert!(GridShape::validated(1).unwrap_err().is_invalid_shape());
        assert!(GridShape::validated(3_000_000).unwrap_err().is_invalid_shape());
        assert!(GridShape::validated(usize::MAX).unwrap_err().is_invalid_shape());
        assert_eq!(GridShape::new(4).checked_len(), Some(192));
    }

    #[test]
    fn test_checked_len_overflow() {
        let shape = BatchShape::new(usize::MAX, 3, 2, 2);
        assert!(shape.checked_len().is_none());
    }
}
