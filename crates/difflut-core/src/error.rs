//! Error types for difflut operations.
//!
//! Every failure in this workspace is a validation failure: tensors whose
//! shapes do not fit the operation. Errors are raised before any pixel is
//! touched, so a failed call never leaves partial output behind.
//!
//! # Usage
//!
//! ```rust
//! use difflut_core::{Error, Result};
//!
//! fn require_rgb(channels: usize) -> Result<()> {
//!     if channels != 3 {
//!         return Err(Error::invalid_shape(
//!             "image batch",
//!             format!("expected 3 channels, got {channels}"),
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_rgb(4).is_err());
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - For derive macro error implementation
//!
//! # Used By
//!
//! - [`crate::grid::Grid`] - Buffer length validation
//! - [`crate::image::ImageBatch`] - Buffer length validation
//! - `difflut-ops` - Forward/backward validation

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in LUT sampling and gradient scattering.
///
/// # Categories
///
/// - **Shape errors**: [`InvalidShape`](Error::InvalidShape)
/// - **Consistency errors**: [`ShapeMismatch`](Error::ShapeMismatch),
///   [`MissingContext`](Error::MissingContext)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A tensor is ill-formed on its own.
    ///
    /// Returned for image batches without exactly 3 channels, grids with
    /// fewer than 2 vertices per axis, non-cubic grids, and buffers whose
    /// length disagrees with the declared shape.
    ///
    /// # Example
    ///
    /// ```rust
    /// use difflut_core::Error;
    ///
    /// let err = Error::invalid_shape("image batch", "expected 3 channels, got 4");
    /// assert!(err.to_string().contains("4"));
    /// ```
    #[error("invalid shape for {what}: {reason}")]
    InvalidShape {
        /// Which tensor was rejected
        what: String,
        /// Why it was rejected
        reason: String,
    },

    /// Two tensors that must agree do not.
    ///
    /// Returned by backward when its inputs disagree with each other or
    /// with the context captured by the matching forward call.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which tensor disagreed
        what: String,
        /// Shape recorded by forward (or by the reference tensor)
        expected: String,
        /// Shape that was presented
        got: String,
    },

    /// Backward was requested without a recorded forward pass.
    #[error("backward called without a matching forward pass")]
    MissingContext,
}

impl Error {
    /// Creates an [`Error::InvalidShape`] error.
    #[inline]
    pub fn invalid_shape(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ShapeMismatch`] error.
    #[inline]
    pub fn shape_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        got: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Returns `true` if this is an [`Error::InvalidShape`].
    #[inline]
    pub fn is_invalid_shape(&self) -> bool {
        matches!(self, Self::InvalidShape { .. })
    }

    /// Returns `true` if this is an [`Error::ShapeMismatch`].
    #[inline]
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }
}
