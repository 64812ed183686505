//! # difflut-core
//!
//! Core tensor types for differentiable 3D lookup tables.
//!
//! - [`Grid`] - `(3, D, D, D)` LUT values or their gradient accumulator
//! - [`ImageBatch`] - `(N, C, W, H)` planar image batch
//! - [`GridShape`], [`BatchShape`] - Shapes and flat addressing
//! - [`Error`], [`Result`] - Validation errors shared by every crate
//!
//! ## Crate Structure
//!
//! ```text
//! difflut-core (this crate)
//!    ^
//!    |
//!    +-- difflut-lut (bin geometry, corner weights)
//!    +-- difflut-ops (sampler, gradient scatterer)
//!    +-- difflut-cli
//! ```
//!
//! Nothing in this crate interpolates; it only owns storage and shapes.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod grid;
pub mod image;
pub mod shape;

pub use error::{Error, Result};
pub use grid::{Grid, MIN_GRID_DIM};
pub use image::ImageBatch;
pub use shape::{BatchShape, GridShape, RGB_CHANNELS};
