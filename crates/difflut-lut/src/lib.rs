//! # difflut-lut
//!
//! Addressing and weighting for 3D LUT interpolation.
//!
//! This crate holds the math that the sampler and the gradient scatterer
//! must agree on bit for bit:
//!
//! - [`BinGeometry`] - `binsize`, `shift` and cell lookup for a grid of
//!   dimension `D`
//! - [`Footprint`] - the 8 vertices and weights of one sample
//! - [`weights`] - trilinear and tetrahedral corner weights and their
//!   derivatives
//! - [`Interpolation`] - method selector
//!
//! # Usage
//!
//! ```rust
//! use difflut_lut::{BinGeometry, Interpolation};
//!
//! let geometry = BinGeometry::new(2).unwrap();
//! let fp = geometry.footprint(Interpolation::Trilinear, [0.5, 0.5, 0.5]);
//! assert!(fp.weights.iter().all(|w| (w - 0.125).abs() < 1e-5));
//! ```
//!
//! # Dependencies
//!
//! - `difflut-core` - Grid and error types
//! - [`serde`] - Serializable [`Interpolation`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod geometry;
mod interp;
pub mod weights;

pub use geometry::{identity_grid, BinGeometry, Cell, Footprint, BINSIZE_NUMERATOR};
pub use interp::Interpolation;
pub use weights::{corner_offset, WeightPartials, Weights, CORNERS};
