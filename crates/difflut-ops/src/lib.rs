//! # difflut-ops
//!
//! Forward and backward kernels of the differentiable 3D LUT.
//!
//! - [`Sampler`] - interpolates the grid at every pixel (forward)
//! - [`GradientScatterer`] - adds output gradients onto grid vertices
//!   (backward)
//! - [`LutFunction`], [`forward`], [`backward`] - the pair an autodiff
//!   host calls
//! - [`LutLayer`], [`LutParameter`] - grid, gradient and tape in one place
//! - [`KernelConfig`] - interpolation, scatter strategy and input gradient
//!
//! Forward and backward share [`BinGeometry::footprint`](difflut_lut::BinGeometry::footprint),
//! so the weights backward scatters are the weights forward used.
//!
//! # Features
//!
//! - `parallel` (default) - run kernels on the `rayon` thread pool. Without
//!   it every strategy runs on the calling thread.
//!
//! # Dependencies
//!
//! - `difflut-core` - Grid, ImageBatch, errors
//! - `difflut-lut` - addressing and weights
//! - [`rayon`](https://docs.rs/rayon) - data parallelism (optional)
//! - [`tracing`] - kernel logging
//! - [`serde`] - [`KernelConfig`] (de)serialization

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod context;
pub mod function;
mod jacobian;
pub mod layer;
mod planar;
pub mod sampler;
pub mod scatter;
pub mod sink;

pub use config::{InputGradient, KernelConfig, ScatterStrategy, DEFAULT_MIN_PARALLEL_PIXELS};
pub use context::ForwardContext;
pub use function::{backward, forward, ForwardOutput, LutFunction};
pub use layer::{LutLayer, LutParameter};
pub use sampler::Sampler;
pub use scatter::GradientScatterer;
pub use sink::{AtomicBuffer, AtomicSink, GradientSink};
