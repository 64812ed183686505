//! Values captured by forward for the matching backward call.
//!
//! The host keeps the [`ForwardContext`] next to the input batch and hands
//! both back to backward. Nothing here is global: two forward calls on
//! different grids produce two independent contexts.

use difflut_core::{BatchShape, Error, Grid, GridShape, ImageBatch, Result};
use difflut_lut::{BinGeometry, Interpolation};

/// Grid geometry and batch shape recorded by a forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardContext {
    geometry: BinGeometry,
    shape: BatchShape,
    interpolation: Interpolation,
}

impl ForwardContext {
    /// Records the geometry and batch shape of a forward call.
    pub fn new(geometry: BinGeometry, shape: BatchShape, interpolation: Interpolation) -> Self {
        Self {
            geometry,
            shape,
            interpolation,
        }
    }

    /// Grid vertices per axis (`D`).
    #[inline]
    pub fn dim(&self) -> usize {
        self.geometry.dim()
    }

    /// Channel stride in the flattened grid (`D^3`).
    #[inline]
    pub fn shift(&self) -> usize {
        self.geometry.shift()
    }

    /// Cell width in input space.
    #[inline]
    pub fn binsize(&self) -> f32 {
        self.geometry.binsize()
    }

    /// Image width.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape.width
    }

    /// Image height.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape.height
    }

    /// Number of images.
    #[inline]
    pub fn batch(&self) -> usize {
        self.shape.batch
    }

    /// Interpolation method used by forward.
    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Bin geometry used by forward.
    #[inline]
    pub fn geometry(&self) -> &BinGeometry {
        &self.geometry
    }

    /// Shape of the forward input (and output).
    #[inline]
    pub fn batch_shape(&self) -> BatchShape {
        self.shape
    }

    /// Shape of the grid forward sampled.
    #[inline]
    pub fn grid_shape(&self) -> GridShape {
        self.geometry.grid_shape()
    }

    /// Checks the tensors handed to backward against this context.
    ///
    /// Fails with [`Error::ShapeMismatch`] when the input batch differs
    /// from the one forward saw, when `output_grad` differs from the input,
    /// or when `grid_grad` differs from the sampled grid.
    pub fn validate_backward(
        &self,
        images: &ImageBatch,
        output_grad: &ImageBatch,
        grid_grad: &Grid,
    ) -> Result<()> {
        if images.shape() != self.shape {
            return Err(Error::shape_mismatch("input images", self.shape, images.shape()));
        }
        if output_grad.shape() != images.shape() {
            return Err(Error::shape_mismatch(
                "output gradient",
                images.shape(),
                output_grad.shape(),
            ));
        }
        self.validate_grid("grid gradient", grid_grad)
    }

    /// Checks that `grid` has the dimension forward sampled.
    pub fn validate_grid(&self, what: &str, grid: &Grid) -> Result<()> {
        if grid.shape() != self.grid_shape() {
            return Err(Error::shape_mismatch(what, self.grid_shape(), grid.shape()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ForwardContext {
        ForwardContext::new(
            BinGeometry::new(5).unwrap(),
            BatchShape::rgb(2, 3, 4),
            Interpolation::Trilinear,
        )
    }

    #[test]
    fn test_accessors() {
        let ctx = context();
        assert_eq!(ctx.dim(), 5);
        assert_eq!(ctx.shift(), 125);
        assert_eq!((ctx.batch(), ctx.width(), ctx.height()), (2, 3, 4));
        assert!((ctx.binsize() - 1.000001 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_backward() {
        let ctx = context();
        let images = ImageBatch::zeros(BatchShape::rgb(2, 3, 4));
        let grad = ImageBatch::zeros(BatchShape::rgb(2, 3, 4));
        let grid_grad = Grid::zeros(5).unwrap();
        assert!(ctx.validate_backward(&images, &grad, &grid_grad).is_ok());

        let bad_grad = ImageBatch::zeros(BatchShape::rgb(2, 4, 3));
        let err = ctx.validate_backward(&images, &bad_grad, &grid_grad).unwrap_err();
        assert!(err.is_shape_mismatch());

        let bad_images = ImageBatch::zeros(BatchShape::rgb(1, 3, 4));
        assert!(ctx
            .validate_backward(&bad_images, &bad_images, &grid_grad)
            .unwrap_err()
            .is_shape_mismatch());

        let bad_grid = Grid::zeros(4).unwrap();
        assert!(ctx
            .validate_backward(&images, &grad, &bad_grid)
            .unwrap_err()
            .is_shape_mismatch());
    }
}
