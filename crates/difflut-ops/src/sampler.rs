//! Forward pass: sample the LUT at every pixel.
//!
//! For every pixel and output channel `c`:
//!
//! ```text
//! output[n, c, x, y] = sum_k weight_k * Grid[c, vertex_k]
//! ```
//!
//! where the 8 vertices and weights come from
//! [`BinGeometry::footprint`](difflut_lut::BinGeometry::footprint). The
//! grid and input are only read; the output is a fresh buffer.
//!
//! # Example
//!
//! ```rust
//! use difflut_core::ImageBatch;
//! use difflut_lut::identity_grid;
//! use difflut_ops::Sampler;
//!
//! let grid = identity_grid(17).unwrap();
//! let images = ImageBatch::from_fn(1, 4, 4, |_, x, y| [x as f32 / 4.0, y as f32 / 4.0, 0.5]);
//! let (_ctx, output) = Sampler::default().forward(&grid, &images).unwrap();
//! assert!((output.get(0, 2, 1, 1) - 0.5).abs() < 1e-5);
//! ```

use crate::planar::map_pixels;
use crate::{ForwardContext, KernelConfig};
use difflut_core::{Grid, ImageBatch, Result};
use difflut_lut::{BinGeometry, Interpolation};
use tracing::{debug, trace};

/// Interpolates a LUT grid at every pixel of an RGB batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    config: KernelConfig,
}

impl Sampler {
    /// Creates a sampler with the given settings.
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Creates a sampler with default settings and `interpolation`.
    pub fn with_interpolation(interpolation: Interpolation) -> Self {
        Self::new(KernelConfig::default().with_interpolation(interpolation))
    }

    /// Interpolation method in use.
    pub fn interpolation(&self) -> Interpolation {
        self.config.interpolation
    }

    /// Samples `grid` at every pixel of `images`.
    ///
    /// Returns the context backward needs together with the output batch.
    /// Fails with `InvalidShape` unless `images` has exactly 3 channels.
    pub fn forward(&self, grid: &Grid, images: &ImageBatch) -> Result<(ForwardContext, ImageBatch)> {
        images.ensure_rgb()?;

        let shape = images.shape();
        let geometry = BinGeometry::of(grid);
        let interpolation = self.config.interpolation;
        let pixels = shape.pixel_count();
        trace!(
            batch = shape.batch,
            width = shape.width,
            height = shape.height,
            dim = geometry.dim(),
            "sampler::forward"
        );
        debug!(pixels, %interpolation, "Sampling LUT");

        let mut output = ImageBatch::zeros(shape);
        let channels = [grid.channel(0), grid.channel(1), grid.channel(2)];
        map_pixels(
            shape,
            images.data(),
            None,
            output.data_mut(),
            self.config.runs_parallel(pixels),
            |rgb, _| {
                let fp = geometry.footprint(interpolation, rgb);
                channels.map(|channel| fp.sample(channel))
            },
        );

        let context = ForwardContext::new(geometry, shape, interpolation);
        Ok((context, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use difflut_core::BatchShape;
    use difflut_lut::identity_grid;

    #[test]
    fn test_rejects_four_channels() {
        let grid = Grid::ones(3).unwrap();
        let images = ImageBatch::zeros(BatchShape::new(1, 4, 2, 2));
        let err = Sampler::default().forward(&grid, &images).unwrap_err();
        assert!(err.is_invalid_shape());
    }

    #[test]
    fn test_constant_grid() {
        let grid = Grid::from_fn(5, |_, _, _| [0.1, 0.2, 0.3]).unwrap();
        let images = ImageBatch::from_fn(2, 3, 3, |n, x, y| {
            [n as f32 * 0.5, x as f32 / 3.0, y as f32 / 3.0]
        });
        for interp in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
            let (_, out) = Sampler::with_interpolation(interp).forward(&grid, &images).unwrap();
            for n in 0..2 {
                for x in 0..3 {
                    for y in 0..3 {
                        let rgb = out.rgb(n, x, y);
                        assert_abs_diff_eq!(rgb[0], 0.1, epsilon = 1e-6);
                        assert_abs_diff_eq!(rgb[1], 0.2, epsilon = 1e-6);
                        assert_abs_diff_eq!(rgb[2], 0.3, epsilon = 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn test_identity_in_both_modes() {
        let grid = identity_grid(33).unwrap();
        let images = ImageBatch::from_fn(1, 8, 8, |_, x, y| {
            [x as f32 / 7.0, y as f32 / 7.0, (x + y) as f32 / 14.0]
        });
        for interp in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
            let (_, out) = Sampler::with_interpolation(interp).forward(&grid, &images).unwrap();
            for (a, b) in out.data().iter().zip(images.data()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_does_not_touch_inputs() {
        let grid = identity_grid(4).unwrap();
        let images = ImageBatch::from_fn(1, 2, 2, |_, _, _| [0.2, 0.4, 0.6]);
        let grid_before = grid.clone();
        let images_before = images.clone();
        Sampler::default().forward(&grid, &images).unwrap();
        assert_eq!(grid, grid_before);
        assert_eq!(images, images_before);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let grid = Grid::from_fn(9, |r, g, b| {
            [(r * g) as f32 * 0.01, (g + b) as f32 * 0.05, (r as f32).sin()]
        })
        .unwrap();
        let images = ImageBatch::from_fn(2, 70, 60, |n, x, y| {
            [x as f32 / 69.0, y as f32 / 59.0, n as f32 * 0.3 + 0.1]
        });
        let serial = KernelConfig::default().with_min_parallel_pixels(usize::MAX);
        let parallel = KernelConfig::default().with_min_parallel_pixels(1);
        let (_, a) = Sampler::new(serial).forward(&grid, &images).unwrap();
        let (_, b) = Sampler::new(parallel).forward(&grid, &images).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_context_records_forward() {
        let grid = Grid::ones(6).unwrap();
        let images = ImageBatch::zeros(BatchShape::rgb(3, 5, 7));
        let (ctx, _) = Sampler::with_interpolation(Interpolation::Tetrahedral)
            .forward(&grid, &images)
            .unwrap();
        assert_eq!(ctx.dim(), 6);
        assert_eq!(ctx.shift(), 216);
        assert_eq!(ctx.batch_shape(), images.shape());
        assert_eq!(ctx.interpolation(), Interpolation::Tetrahedral);
    }
}
