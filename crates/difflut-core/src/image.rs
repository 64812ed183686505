//! Planar image batches.
//!
//! An [`ImageBatch`] stores `N` images of `C` channels as one contiguous
//! `f32` buffer in `(N, C, W, H)` order. The same type carries input
//! images, sampled output, and the gradients flowing back through them.
//!
//! # Memory Layout
//!
//! ```text
//! image 0: [R plane (W*H)] [G plane (W*H)] [B plane (W*H)]
//! image 1: [R plane (W*H)] [G plane (W*H)] [B plane (W*H)]
//! ...
//! ```
//!
//! # Usage
//!
//! ```rust
//! use difflut_core::{BatchShape, ImageBatch};
//!
//! let mut batch = ImageBatch::zeros(BatchShape::rgb(1, 2, 2));
//! batch.set_rgb(0, 1, 0, [0.25, 0.5, 0.75]);
//! assert_eq!(batch.rgb(0, 1, 0), [0.25, 0.5, 0.75]);
//! ```

use crate::{BatchShape, Error, Result, RGB_CHANNELS};

/// A dense batch of planar images.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    data: Vec<f32>,
    shape: BatchShape,
}

impl ImageBatch {
    /// Creates a zero-filled batch.
    ///
    /// # Panics
    ///
    /// Panics if the value count of `shape` overflows `usize`; see
    /// [`ImageBatch::try_zeros`].
    pub fn zeros(shape: BatchShape) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Creates a batch with every value set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if the value count of `shape` overflows `usize`; see
    /// [`ImageBatch::try_filled`].
    pub fn filled(shape: BatchShape, value: f32) -> Self {
        Self {
            data: vec![value; shape.checked_len().unwrap_or(usize::MAX)],
            shape,
        }
    }

    /// Creates a zero-filled batch, failing with [`Error::InvalidShape`]
    /// when the value count overflows.
    pub fn try_zeros(shape: BatchShape) -> Result<Self> {
        Self::try_filled(shape, 0.0)
    }

    /// Fallible [`ImageBatch::filled`].
    pub fn try_filled(shape: BatchShape, value: f32) -> Result<Self> {
        let len = checked_len(shape)?;
        Ok(Self {
            data: vec![value; len],
            shape,
        })
    }

    /// Wraps existing storage laid out as `(N, C, W, H)`.
    pub fn from_vec(shape: BatchShape, data: Vec<f32>) -> Result<Self> {
        let expected = checked_len(shape)?;
        if data.len() != expected {
            return Err(Error::invalid_shape(
                "image batch",
                format!("expected {expected} values for {shape}, got {}", data.len()),
            ));
        }
        Ok(Self { data, shape })
    }

    /// Builds an RGB batch from a per-pixel function of `(n, x, y)`.
    ///
    /// # Panics
    ///
    /// Panics on the same overflow as [`ImageBatch::zeros`]; see
    /// [`ImageBatch::try_from_fn`].
    pub fn from_fn<F>(batch: usize, width: usize, height: usize, f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> [f32; 3],
    {
        Self::zeros(BatchShape::rgb(batch, width, height)).fill_rgb(f)
    }

    /// Fallible [`ImageBatch::from_fn`].
    pub fn try_from_fn<F>(batch: usize, width: usize, height: usize, f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> [f32; 3],
    {
        Ok(Self::try_zeros(BatchShape::rgb(batch, width, height))?.fill_rgb(f))
    }

    fn fill_rgb<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> [f32; 3],
    {
        let shape = self.shape;
        for n in 0..shape.batch {
            for x in 0..shape.width {
                for y in 0..shape.height {
                    self.set_rgb(n, x, y, f(n, x, y));
                }
            }
        }
        self
    }

    /// Batch shape.
    #[inline]
    pub fn shape(&self) -> BatchShape {
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

    /// Consumes the batch and returns its storage.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Value at `(n, c, x, y)`.
    #[inline]
    pub fn get(&self, n: usize, c: usize, x: usize, y: usize) -> f32 {
        self.data[self.shape.index(n, c, x, y)]
    }

    /// Sets the value at `(n, c, x, y)`.
    #[inline]
    pub fn set(&mut self, n: usize, c: usize, x: usize, y: usize, value: f32) {
        let idx = self.shape.index(n, c, x, y);
        self.data[idx] = value;
    }

    /// First three channels of pixel `(x, y)` in image `n`.
    #[inline]
    pub fn rgb(&self, n: usize, x: usize, y: usize) -> [f32; 3] {
        [self.get(n, 0, x, y), self.get(n, 1, x, y), self.get(n, 2, x, y)]
    }

    /// Sets the first three channels of pixel `(x, y)` in image `n`.
    #[inline]
    pub fn set_rgb(&mut self, n: usize, x: usize, y: usize, rgb: [f32; 3]) {
        for (c, value) in rgb.into_iter().enumerate() {
            self.set(n, c, x, y, value);
        }
    }

    /// Sum of each channel across the whole batch.
    pub fn channel_sums(&self) -> Vec<f32> {
        let mut sums = vec![0.0f32; self.shape.channels];
        let plane = self.shape.plane_len();
        if plane == 0 {
            return sums;
        }
        for image in self.data.chunks(self.shape.image_len()) {
            for (c, values) in image.chunks(plane).enumerate() {
                sums[c] += values.iter().sum::<f32>();
            }
        }
        sums
    }

    /// Fails with [`Error::InvalidShape`] unless the batch has 3 channels.
    pub fn ensure_rgb(&self) -> Result<()> {
        if self.shape.channels != RGB_CHANNELS {
            return Err(Error::invalid_shape(
                "image batch",
                format!(
                    "expected {RGB_CHANNELS} channels, got {} (shape {})",
                    self.shape.channels, self.shape
                ),
            ));
        }
        Ok(())
    }
}

fn checked_len(shape: BatchShape) -> Result<usize> {
    shape
        .checked_len()
        .ok_or_else(|| Error::invalid_shape("image batch", format!("{shape} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_vec_validates_length() {
        let shape = BatchShape::rgb(1, 2, 2);
        assert!(ImageBatch::from_vec(shape, vec![0.0; 12]).is_ok());
        assert!(ImageBatch::from_vec(shape, vec![0.0; 11]).unwrap_err().is_invalid_shape());
    }

    #[test]
    fn test_fallible_constructors_reject_overflow() {
        let huge = BatchShape::rgb(usize::MAX / 2, 2, 2);
        assert!(ImageBatch::try_zeros(huge).unwrap_err().is_invalid_shape());
        assert!(ImageBatch::try_filled(huge, 1.0).unwrap_err().is_invalid_shape());
        let err = ImageBatch::try_from_fn(usize::MAX, 2, 2, |_, _, _| [0.0; 3]).unwrap_err();
        assert!(err.is_invalid_shape());
    }

    #[test]
    fn test_fallible_constructors_match() {
        let shape = BatchShape::rgb(2, 3, 1);
        assert_eq!(ImageBatch::try_zeros(shape).unwrap(), ImageBatch::zeros(shape));
        let f = |n: usize, x: usize, y: usize| [n as f32, x as f32, y as f32];
        assert_eq!(
            ImageBatch::try_from_fn(2, 3, 1, f).unwrap(),
            ImageBatch::from_fn(2, 3, 1, f)
        );
    }

    #[test]
    #[should_panic]
    fn test_filled_panics_on_overflow() {
        ImageBatch::zeros(BatchShape::rgb(usize::MAX / 2, 2, 2));
    }

    #[test]
    fn test_rgb_roundtrip_is_planar() {
        let mut batch = ImageBatch::zeros(BatchShape::rgb(2, 2, 3));
        batch.set_rgb(1, 1, 2, [0.1, 0.2, 0.3]);
        let plane = 6;
        // image 1 starts at 18, x = 1 is 3 values in, y = 2
        let base = 18 + 3 + 2;
        assert_eq!(batch.data()[base], 0.1);
        assert_eq!(batch.data()[base + plane], 0.2);
        assert_eq!(batch.data()[base + 2 * plane], 0.3);
    }

    #[test]
    fn test_ensure_rgb() {
        assert!(ImageBatch::zeros(BatchShape::rgb(1, 1, 1)).ensure_rgb().is_ok());
        let rgba = ImageBatch::zeros(BatchShape::new(1, 4, 1, 1));
        assert!(rgba.ensure_rgb().unwrap_err().is_invalid_shape());
    }

    #[test]
    fn test_channel_sums() {
        let batch = ImageBatch::from_fn(2, 2, 2, |n, _, y| [0.1, 0.25 * (n + y) as f32, 0.0]);
        let sums = batch.channel_sums();
        assert_eq!(sums.len(), 3);
        assert_relative_eq!(sums[0], 0.8, max_relative = 1e-6);
        assert_relative_eq!(sums[1], 2.0, max_relative = 1e-6);
        assert_eq!(sums[2], 0.0);
    }
}
