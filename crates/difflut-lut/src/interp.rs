//! Interpolation methods for LUT evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation method for LUT evaluation.
///
/// Forward and backward must use the same method; it travels with the
/// forward context for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Trilinear interpolation over all 8 cell corners.
    ///
    /// Default method, separable and smooth inside a cell.
    #[default]
    Trilinear,

    /// Tetrahedral interpolation over 4 of the 8 corners.
    ///
    /// Keeps the neutral axis exact and is cheaper per channel.
    Tetrahedral,
}

impl Interpolation {
    /// Lowercase name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trilinear => "trilinear",
            Self::Tetrahedral => "tetrahedral",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trilinear" | "linear" => Ok(Self::Trilinear),
            "tetrahedral" | "tetra" => Ok(Self::Tetrahedral),
            other => Err(format!(
                "unknown interpolation '{other}' (expected trilinear or tetrahedral)"
            )),
        }
    }
}
