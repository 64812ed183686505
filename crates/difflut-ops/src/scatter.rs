//! Backward pass: scatter output gradients onto grid vertices.
//!
//! For every pixel, output channel `c` and corner `k`:
//!
//! ```text
//! GridGrad[c, vertex_k] += weight_k * incoming[n, c, x, y]
//! ```
//!
//! Vertices and weights are recomputed from the input colors with the same
//! [`BinGeometry::footprint`] the sampler used. Many pixels hit the same
//! vertex, so the accumulator is never written from two threads without
//! going through [`ScatterStrategy::PerWorker`] buffers or an
//! [`AtomicBuffer`].

use crate::planar::read_rgb;
use crate::sink::{AtomicBuffer, GradientSink};
use crate::{ForwardContext, KernelConfig, ScatterStrategy};
use difflut_core::{BatchShape, Grid, ImageBatch, Result};
use difflut_lut::{BinGeometry, Interpolation, CORNERS};
use std::ops::Range;
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Accumulates LUT gradients from output gradients.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientScatterer {
    config: KernelConfig,
}

/// Read-only inputs of one scatter call.
#[derive(Clone, Copy)]
struct ScatterJob<'a> {
    geometry: &'a BinGeometry,
    interpolation: Interpolation,
    shape: BatchShape,
    images: &'a [f32],
    grads: &'a [f32],
}

impl GradientScatterer {
    /// Creates a scatterer with the given settings.
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Creates a scatterer with default settings and `strategy`.
    pub fn with_strategy(strategy: ScatterStrategy) -> Self {
        Self::new(KernelConfig::default().with_scatter(strategy))
    }

    /// Strategy in use.
    pub fn strategy(&self) -> ScatterStrategy {
        self.config.scatter
    }

    /// Adds the gradient of every grid vertex into `grid_grad`.
    ///
    /// `images` must be the batch forward saw and `output_grad` must share
    /// its shape; `grid_grad` must have the forward grid's dimension.
    /// Existing contents of `grid_grad` are kept and added to.
    ///
    /// The interpolation method comes from `ctx`, not from this scatterer's
    /// config, so backward always mirrors forward.
    pub fn scatter(
        &self,
        ctx: &ForwardContext,
        images: &ImageBatch,
        output_grad: &ImageBatch,
        grid_grad: &mut Grid,
    ) -> Result<()> {
        ctx.validate_backward(images, output_grad, grid_grad)?;

        let shape = images.shape();
        let pixels = shape.pixel_count();
        let strategy = self.effective_strategy(pixels);
        trace!(
            batch = shape.batch,
            width = shape.width,
            height = shape.height,
            dim = ctx.dim(),
            "scatter::backward"
        );
        debug!(pixels, %strategy, interpolation = %ctx.interpolation(), "Scattering LUT gradient");

        if pixels == 0 {
            return Ok(());
        }

        let job = ScatterJob {
            geometry: ctx.geometry(),
            interpolation: ctx.interpolation(),
            shape,
            images: images.data(),
            grads: output_grad.data(),
        };

        match strategy {
            ScatterStrategy::Serial => {
                job.run(grid_grad.data_mut(), 0..pixels);
                Ok(())
            }
            ScatterStrategy::PerWorker => {
                let total = job.per_worker(grid_grad.data().len(), pixels);
                grid_grad.accumulate(&total)
            }
            ScatterStrategy::Atomic => {
                let buffer = AtomicBuffer::zeros(grid_grad.data().len());
                job.atomic(&buffer, pixels);
                grid_grad.accumulate(&buffer.into_values())
            }
        }
    }

    /// Falls back to serial for small batches or without `parallel`.
    fn effective_strategy(&self, pixels: usize) -> ScatterStrategy {
        if self.config.runs_parallel(pixels) {
            self.config.scatter
        } else {
            ScatterStrategy::Serial
        }
    }
}

impl ScatterJob<'_> {
    /// Scatters pixels `range` (global pixel indices across the batch).
    fn run<S: GradientSink + ?Sized>(&self, sink: &mut S, range: Range<usize>) {
        let plane = self.shape.plane_len();
        let image_len = self.shape.image_len();
        let shift = self.geometry.shift();

        for q in range {
            let base = (q / plane) * image_len;
            let p = q % plane;
            let image = &self.images[base..base + image_len];
            let grad = read_rgb(&self.grads[base..base + image_len], plane, p);

            let fp = self.geometry.footprint(self.interpolation, read_rgb(image, plane, p));
            for k in 0..CORNERS {
                let w = fp.weights[k];
                let v = fp.vertices[k];
                for (c, g) in grad.iter().enumerate() {
                    sink.add(c * shift + v, w * g);
                }
            }
        }
    }

    /// Pixels per task so that roughly four tasks run per worker.
    #[cfg(feature = "parallel")]
    fn task_len(pixels: usize) -> usize {
        let tasks = rayon::current_num_threads().max(1) * 4;
        pixels.div_ceil(tasks).max(crate::planar::SPAN)
    }

    #[cfg(feature = "parallel")]
    fn per_worker(&self, len: usize, pixels: usize) -> Vec<f32> {
        let task = Self::task_len(pixels);
        let tasks = pixels.div_ceil(task);
        (0..tasks)
            .into_par_iter()
            .fold(
                || vec![0.0f32; len],
                |mut acc, t| {
                    self.run(&mut acc, t * task..((t + 1) * task).min(pixels));
                    acc
                },
            )
            .reduce(
                || vec![0.0f32; len],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(&b) {
                        *x += *y;
                    }
                    a
                },
            )
    }

    #[cfg(not(feature = "parallel"))]
    fn per_worker(&self, len: usize, pixels: usize) -> Vec<f32> {
        let mut acc = vec![0.0f32; len];
        self.run(&mut acc, 0..pixels);
        acc
    }

    #[cfg(feature = "parallel")]
    fn atomic(&self, buffer: &AtomicBuffer, pixels: usize) {
        let task = Self::task_len(pixels);
        let tasks = pixels.div_ceil(task);
        (0..tasks).into_par_iter().for_each(|t| {
            let mut sink = buffer.sink();
            self.run(&mut sink, t * task..((t + 1) * task).min(pixels));
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn atomic(&self, buffer: &AtomicBuffer, pixels: usize) {
        let mut sink = buffer.sink();
        self.run(&mut sink, 0..pixels);
    }
}
