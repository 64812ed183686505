//! Kernel configuration.
//!
//! [`KernelConfig`] is plain data: it derives serde so a host can load it
//! from a file, and every field has a default so partial files work.
//!
//! ```rust
//! use difflut_ops::{KernelConfig, ScatterStrategy};
//!
//! let config = KernelConfig::default().with_scatter(ScatterStrategy::Atomic);
//! assert_eq!(config.scatter, ScatterStrategy::Atomic);
//! ```

use difflut_lut::Interpolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel count below which kernels stay on the calling thread.
pub const DEFAULT_MIN_PARALLEL_PIXELS: usize = 4096;

/// How concurrent gradient contributions are combined.
///
/// All strategies give the same result up to float summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScatterStrategy {
    /// One thread adds straight into the accumulator.
    Serial,
    /// Each worker folds into a private grid-sized buffer; buffers are
    /// summed pairwise and added to the accumulator at the end.
    PerWorker,
    /// Workers add into a shared buffer of atomic cells.
    Atomic,
}

impl Default for ScatterStrategy {
    fn default() -> Self {
        if cfg!(feature = "parallel") {
            Self::PerWorker
        } else {
            Self::Serial
        }
    }
}

impl ScatterStrategy {
    /// Kebab-case name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::PerWorker => "per-worker",
            Self::Atomic => "atomic",
        }
    }
}

impl fmt::Display for ScatterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScatterStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "per-worker" | "perworker" | "worker" => Ok(Self::PerWorker),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!(
                "unknown scatter strategy '{other}' (expected serial, per-worker or atomic)"
            )),
        }
    }
}

/// What backward returns as the gradient w.r.t. the input images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputGradient {
    /// The incoming output gradient, unchanged.
    #[default]
    PassThrough,
    /// The true derivative through the interpolation weights.
    Geometric,
}

impl InputGradient {
    /// Kebab-case name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::Geometric => "geometric",
        }
    }
}

impl fmt::Display for InputGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputGradient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "geometric" => Ok(Self::Geometric),
            other => Err(format!(
                "unknown input gradient '{other}' (expected pass-through or geometric)"
            )),
        }
    }
}

/// Settings shared by the sampler and the gradient scatterer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Corner weighting rule
    pub interpolation: Interpolation,
    /// Gradient accumulation strategy
    pub scatter: ScatterStrategy,
    /// Input gradient rule
    pub input_gradient: InputGradient,
    /// Smallest batch (in pixels) worth spreading across threads
    pub min_parallel_pixels: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            scatter: ScatterStrategy::default(),
            input_gradient: InputGradient::default(),
            min_parallel_pixels: DEFAULT_MIN_PARALLEL_PIXELS,
        }
    }
}

impl KernelConfig {
    /// Sets the interpolation method.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Sets the scatter strategy.
    pub fn with_scatter(mut self, scatter: ScatterStrategy) -> Self {
        self.scatter = scatter;
        self
    }

    /// Sets the input gradient rule.
    pub fn with_input_gradient(mut self, input_gradient: InputGradient) -> Self {
        self.input_gradient = input_gradient;
        self
    }

    /// Sets the parallel threshold.
    pub fn with_min_parallel_pixels(mut self, pixels: usize) -> Self {
        self.min_parallel_pixels = pixels;
        self
    }

    /// Whether a batch of `pixels` should run on the thread pool.
    #[inline]
    pub fn runs_parallel(&self, pixels: usize) -> bool {
        cfg!(feature = "parallel") && pixels >= self.min_parallel_pixels.max(1)
    }
}
