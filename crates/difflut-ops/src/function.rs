//! The forward/backward pair handed to an autodiff host.
//!
//! A host calls [`LutFunction::forward`] during its computation pass, keeps
//! the returned [`ForwardContext`] and the input batch, and later calls
//! [`LutFunction::backward`] with the gradient of its loss w.r.t. the
//! output. The grid gradient is added into a buffer the host owns.
//!
//! ```rust
//! use difflut_core::{Grid, ImageBatch};
//! use difflut_ops::{backward, forward};
//!
//! let grid = Grid::ones(17).unwrap();
//! let images = ImageBatch::from_fn(2, 4, 4, |_, x, y| [x as f32 / 3.0, y as f32 / 3.0, 0.5]);
//!
//! let fwd = forward(&grid, &images).unwrap();
//! let output_grad = ImageBatch::filled(fwd.output.shape(), 1.0);
//! let mut grid_grad = Grid::zeros(17).unwrap();
//! let input_grad = backward(&fwd.context, &images, &output_grad, &mut grid_grad).unwrap();
//!
//! assert_eq!(input_grad, output_grad);
//! assert!((grid_grad.channel_sums()[0] - 32.0).abs() < 1e-3);
//! ```

use crate::jacobian::input_gradient;
use crate::{ForwardContext, GradientScatterer, InputGradient, KernelConfig, Sampler};
use difflut_core::{Grid, ImageBatch, Result};
use tracing::debug;

/// Result of a forward call.
#[derive(Debug, Clone)]
pub struct ForwardOutput<'g> {
    /// The grid that was sampled, returned unchanged.
    pub lut: &'g Grid,
    /// Interpolated images, shaped like the input.
    pub output: ImageBatch,
    /// Values backward needs.
    pub context: ForwardContext,
}

/// Sampler and scatterer sharing one [`KernelConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LutFunction {
    config: KernelConfig,
}

impl LutFunction {
    /// Creates a function with the given settings.
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Samples `grid` at every pixel of `images`.
    pub fn forward<'g>(&self, grid: &'g Grid, images: &ImageBatch) -> Result<ForwardOutput<'g>> {
        let (context, output) = Sampler::new(self.config).forward(grid, images)?;
        Ok(ForwardOutput {
            lut: grid,
            output,
            context,
        })
    }

    /// Adds the grid gradient into `grid_grad` and returns the input gradient.
    ///
    /// `grid` is the grid forward sampled. It is only read when the
    /// geometric input gradient is selected, but its shape is checked
    /// against `ctx` either way. All shape checks run before any gradient
    /// is written.
    pub fn backward(
        &self,
        ctx: &ForwardContext,
        grid: &Grid,
        images: &ImageBatch,
        output_grad: &ImageBatch,
        grid_grad: &mut Grid,
    ) -> Result<ImageBatch> {
        ctx.validate_grid("grid", grid)?;
        GradientScatterer::new(self.config).scatter(ctx, images, output_grad, grid_grad)?;

        debug!(input_gradient = %self.config.input_gradient, "Computing input gradient");
        Ok(match self.config.input_gradient {
            InputGradient::PassThrough => output_grad.clone(),
            InputGradient::Geometric => input_gradient(
                grid,
                ctx.geometry(),
                ctx.interpolation(),
                images,
                output_grad,
                self.config.runs_parallel(images.shape().pixel_count()),
            ),
        })
    }
}

/// Trilinear forward with default settings.
pub fn forward<'g>(grid: &'g Grid, images: &ImageBatch) -> Result<ForwardOutput<'g>> {
    LutFunction::default().forward(grid, images)
}

/// Backward with default settings.
///
/// Adds into `grid_grad` and returns the incoming gradient unchanged as the
/// input gradient. The grid itself is not needed.
pub fn backward(
    ctx: &ForwardContext,
    images: &ImageBatch,
    output_grad: &ImageBatch,
    grid_grad: &mut Grid,
) -> Result<ImageBatch> {
    GradientScatterer::default().scatter(ctx, images, output_grad, grid_grad)?;
    Ok(output_grad.clone())
}
