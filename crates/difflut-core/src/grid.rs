//! LUT grid storage.
//!
//! A [`Grid`] is a dense `(3, D, D, D)` array of `f32`. Axis 0 selects the
//! output channel, axes 1-3 index the quantized input R, G and B. The same
//! type holds both LUT values and their gradient accumulator, since the two
//! always share a shape.

use crate::{Error, GridShape, Result, RGB_CHANNELS};

/// Smallest legal vertex count per axis; one cell needs two vertices.
pub const MIN_GRID_DIM: usize = 2;

/// A dense 3D lookup table with one sub-grid per output channel.
///
/// # Example
///
/// ```rust
/// use difflut_core::Grid;
///
/// let mut grid = Grid::zeros(17).unwrap();
/// grid.set(1, 0, 16, 0, 0.5);
/// assert_eq!(grid.get(1, 0, 16, 0), 0.5);
/// assert_eq!(grid.data().len(), 3 * 17 * 17 * 17);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    data: Vec<f32>,
    shape: GridShape,
}

impl Grid {
    /// Creates a grid filled with `value`.
    pub fn filled(dim: usize, value: f32) -> Result<Self> {
        let shape = GridShape::validated(dim)?;
        Ok(Self {
            data: vec![value; shape.len()],
            shape,
        })
    }

    /// Creates a zeroed grid; the starting state of a gradient accumulator.
    pub fn zeros(dim: usize) -> Result<Self> {
        Self::filled(dim, 0.0)
    }

    /// Creates a grid of ones.
    pub fn ones(dim: usize) -> Result<Self> {
        Self::filled(dim, 1.0)
    }

    /// Wraps existing storage laid out as `(3, D, D, D)`.
    pub fn from_vec(dim: usize, data: Vec<f32>) -> Result<Self> {
        let shape = GridShape::validated(dim)?;
        if data.len() != shape.len() {
            return Err(Error::invalid_shape(
                "grid",
                format!(
                    "expected {} values for dimension {}, got {}",
                    shape.len(),
                    dim,
                    data.len()
                ),
            ));
        }
        Ok(Self { data, shape })
    }

    /// Builds a grid from a per-vertex function returning all 3 channels.
    ///
    /// `f` receives the vertex coordinates `(r, g, b)`.
    pub fn from_fn<F>(dim: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> [f32; 3],
    {
        let mut grid = Self::zeros(dim)?;
        let shift = grid.shape.shift();
        for r in 0..dim {
            for g in 0..dim {
                for b in 0..dim {
                    let v = grid.shape.vertex(r, g, b);
                    let rgb = f(r, g, b);
                    for (c, value) in rgb.into_iter().enumerate() {
                        grid.data[c * shift + v] = value;
                    }
                }
            }
        }
        Ok(grid)
    }

    /// Vertices per axis.
    #[inline]
    pub fn dim(&self) -> usize {
        self.shape.dim
    }

    /// Full shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Raw values.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw values.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the grid and returns its storage.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Value at `(c, r, g, b)`.
    #[inline]
    pub fn get(&self, c: usize, r: usize, g: usize, b: usize) -> f32 {
        self.data[self.shape.index(c, r, g, b)]
    }

    /// Sets the value at `(c, r, g, b)`.
    #[inline]
    pub fn set(&mut self, c: usize, r: usize, g: usize, b: usize, value: f32) {
        let idx = self.shape.index(c, r, g, b);
        self.data[idx] = value;
    }

    /// The sub-grid for output channel `c`.
    #[inline]
    pub fn channel(&self, c: usize) -> &[f32] {
        let shift = self.shape.shift();
        &self.data[c * shift..(c + 1) * shift]
    }

    /// Overwrites every value.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Adds `other` element-wise into this grid.
    pub fn accumulate(&mut self, other: &[f32]) -> Result<()> {
        if other.len() != self.data.len() {
            return Err(Error::shape_mismatch(
                "grid accumulation",
                self.data.len(),
                other.len(),
            ));
        }
        for (dst, src) in self.data.iter_mut().zip(other) {
            *dst += *src;
        }
        Ok(())
    }

    /// Sum of each output channel's sub-grid.
    pub fn channel_sums(&self) -> [f32; 3] {
        let mut sums = [0.0f32; RGB_CHANNELS];
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum = self.channel(c).iter().sum();
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_small_dim() {
        assert!(Grid::zeros(1).unwrap_err().is_invalid_shape());
        assert!(Grid::zeros(0).is_err());
        assert!(Grid::zeros(2).is_ok());
    }

    #[test]
    fn test_rejects_overflowing_dim() {
        assert!(Grid::zeros(3_000_000).unwrap_err().is_invalid_shape());
    }

    #[test]
    fn test_from_vec_length() {
        assert!(Grid::from_vec(2, vec![0.0; 24]).is_ok());
        let err = Grid::from_vec(2, vec![0.0; 23]).unwrap_err();
        assert!(err.is_invalid_shape());
    }

    #[test]
    fn test_from_fn_layout() {
        let grid = Grid::from_fn(3, |r, g, b| [r as f32, g as f32, b as f32]).unwrap();
        assert_eq!(grid.get(0, 2, 1, 0), 2.0);
        assert_eq!(grid.get(1, 2, 1, 0), 1.0);
        assert_eq!(grid.get(2, 2, 1, 0), 0.0);
        // b is the fastest axis
        assert_eq!(grid.data()[1], 0.0);
        assert_eq!(grid.data()[27 * 2 + 1], 1.0);
    }

    #[test]
    fn test_accumulate_adds() {
        let mut grid = Grid::ones(2).unwrap();
        grid.accumulate(&[2.0; 24]).unwrap();
        assert!(grid.data().iter().all(|&v| v == 3.0));
        assert!(grid.accumulate(&[1.0; 3]).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_channel_sums() {
        let grid = Grid::from_fn(2, |r, g, b| [0.1, 0.2 * (r + g + b) as f32, 0.5]).unwrap();
        let [r, g, b] = grid.channel_sums();
        assert_relative_eq!(r, 0.8, max_relative = 1e-6);
        assert_relative_eq!(g, 2.4, max_relative = 1e-6);
        assert_relative_eq!(b, 4.0, max_relative = 1e-6);
    }
}
