//! A trainable LUT: grid, gradient accumulator, and the tape between
//! forward and backward.
//!
//! [`LutParameter`] owns the storage; [`LutLayer`] records what forward saw
//! so backward can be called with just the output gradient.
//!
//! ```rust
//! use difflut_core::ImageBatch;
//! use difflut_ops::LutLayer;
//!
//! let mut layer = LutLayer::new(LutLayer::DEFAULT_DIM).unwrap();
//! let images = ImageBatch::from_fn(1, 2, 2, |_, x, y| [x as f32, y as f32, 0.5]);
//!
//! let output = layer.forward(&images).unwrap();
//! let grad = ImageBatch::filled(output.shape(), 1.0);
//! layer.backward(&grad).unwrap();
//!
//! assert!((layer.param().grad().channel_sums()[1] - 4.0).abs() < 1e-4);
//! layer.zero_grad();
//! ```

use crate::{ForwardContext, KernelConfig, LutFunction};
use difflut_core::{Error, Grid, ImageBatch, Result};
use tracing::debug;

/// A LUT grid and its gradient accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct LutParameter {
    value: Grid,
    grad: Grid,
}

impl LutParameter {
    /// Wraps `value` with a zeroed gradient of the same dimension.
    pub fn new(value: Grid) -> Result<Self> {
        let grad = Grid::zeros(value.dim())?;
        Ok(Self { value, grad })
    }

    /// Current grid values.
    #[inline]
    pub fn value(&self) -> &Grid {
        &self.value
    }

    /// Mutable grid values, for an optimizer step.
    #[inline]
    pub fn value_mut(&mut self) -> &mut Grid {
        &mut self.value
    }

    /// Accumulated gradient.
    #[inline]
    pub fn grad(&self) -> &Grid {
        &self.grad
    }

    /// Grid values and gradient, borrowed together.
    #[inline]
    pub fn split_mut(&mut self) -> (&Grid, &mut Grid) {
        (&self.value, &mut self.grad)
    }

    /// Resets the accumulated gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

#[derive(Debug, Clone)]
struct Tape {
    context: ForwardContext,
    input: ImageBatch,
}

/// LUT layer with its own tape.
#[derive(Debug, Clone)]
pub struct LutLayer {
    param: LutParameter,
    function: LutFunction,
    tape: Option<Tape>,
}

impl LutLayer {
    /// Grid dimension used when none is given.
    pub const DEFAULT_DIM: usize = 17;

    /// Creates a layer of dimension `dim` with every grid value set to 1.
    pub fn new(dim: usize) -> Result<Self> {
        Self::with_grid(Grid::ones(dim)?, KernelConfig::default())
    }

    /// Creates a layer around an existing grid.
    pub fn with_grid(grid: Grid, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            param: LutParameter::new(grid)?,
            function: LutFunction::new(config),
            tape: None,
        })
    }

    /// Grid and gradient.
    pub fn param(&self) -> &LutParameter {
        &self.param
    }

    /// Mutable grid and gradient.
    pub fn param_mut(&mut self) -> &mut LutParameter {
        &mut self.param
    }

    /// Settings in use.
    pub fn config(&self) -> &KernelConfig {
        self.function.config()
    }

    /// Returns `true` when a forward call is waiting for its backward.
    pub fn has_tape(&self) -> bool {
        self.tape.is_some()
    }

    /// Samples the grid and records the call for [`backward`](Self::backward).
    ///
    /// A second forward before backward replaces the recorded call.
    pub fn forward(&mut self, images: &ImageBatch) -> Result<ImageBatch> {
        let fwd = self.function.forward(&self.param.value, images)?;
        self.tape = Some(Tape {
            context: fwd.context,
            input: images.clone(),
        });
        Ok(fwd.output)
    }

    /// Adds the grid gradient for the recorded forward call and returns the
    /// input gradient.
    ///
    /// Fails with [`Error::MissingContext`] when no forward call is
    /// recorded. The tape is only cleared once backward succeeds.
    pub fn backward(&mut self, output_grad: &ImageBatch) -> Result<ImageBatch> {
        let tape = self.tape.as_ref().ok_or(Error::MissingContext)?;
        let (value, grad) = self.param.split_mut();
        let input_grad =
            self.function
                .backward(&tape.context, value, &tape.input, output_grad, grad)?;
        debug!(dim = tape.context.dim(), "LUT layer backward done");
        self.tape = None;
        Ok(input_grad)
    }

    /// Resets the accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.param.zero_grad();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use difflut_core::BatchShape;

    #[test]
    fn test_default_layer() {
        let layer = LutLayer::new(LutLayer::DEFAULT_DIM).unwrap();
        assert_eq!(layer.param().value().dim(), 17);
        assert!(layer.param().value().data().iter().all(|&v| v == 1.0));
        assert!(layer.param().grad().data().iter().all(|&v| v == 0.0));
        assert!(!layer.has_tape());
    }

    #[test]
    fn test_backward_without_forward() {
        let mut layer = LutLayer::new(3).unwrap();
        let grad = ImageBatch::zeros(BatchShape::rgb(1, 1, 1));
        assert_eq!(layer.backward(&grad), Err(Error::MissingContext));
    }

    #[test]
    fn test_tape_consumed() {
        let mut layer = LutLayer::new(3).unwrap();
        let images = ImageBatch::filled(BatchShape::rgb(1, 2, 2), 0.3);
        layer.forward(&images).unwrap();
        assert!(layer.has_tape());
        layer.backward(&ImageBatch::filled(images.shape(), 1.0)).unwrap();
        assert!(!layer.has_tape());
        assert_eq!(
            layer.backward(&ImageBatch::filled(images.shape(), 1.0)),
            Err(Error::MissingContext)
        );
    }

    #[test]
    fn test_failed_backward_keeps_tape() {
        let mut layer = LutLayer::new(3).unwrap();
        let images = ImageBatch::filled(BatchShape::rgb(1, 2, 2), 0.3);
        layer.forward(&images).unwrap();
        let bad = ImageBatch::zeros(BatchShape::rgb(1, 2, 3));
        assert!(layer.backward(&bad).unwrap_err().is_shape_mismatch());
        assert!(layer.has_tape());
        assert!(layer.backward(&ImageBatch::zeros(images.shape())).is_ok());
    }

    #[test]
    fn test_gradients_accumulate_until_zeroed() {
        let mut layer = LutLayer::new(4).unwrap();
        let images = ImageBatch::filled(BatchShape::rgb(1, 3, 3), 0.6);
        for _ in 0..3 {
            let out = layer.forward(&images).unwrap();
            layer.backward(&ImageBatch::filled(out.shape(), 1.0)).unwrap();
        }
        let sums = layer.param().grad().channel_sums();
        assert!((sums[0] - 27.0).abs() < 1e-3);

        layer.zero_grad();
        assert!(layer.param().grad().data().iter().all(|&v| v == 0.0));
    }
}
