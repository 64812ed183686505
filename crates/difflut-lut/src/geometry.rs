//! Bin geometry and cell addressing.
//!
//! This is the single addressing routine shared by the sampler and the
//! gradient scatterer. Both call [`BinGeometry::footprint`] so that the
//! vertices and weights used in forward are exactly the ones backward
//! scatters onto.
//!
//! # Addressing
//!
//! For one channel value `c`:
//!
//! ```text
//! binsize = 1.000001 / (D - 1)
//! id      = clamp(floor(c / binsize), 0, D - 2)
//! frac    = c / binsize - id
//! ```
//!
//! The epsilon in `binsize` keeps `c = 1.0` inside the last cell instead of
//! on its far edge. Inputs outside `[0, 1]` land in the first or last cell
//! with a fraction outside `[0, 1)`, which extrapolates linearly.

use crate::weights::{self, corner_offset, WeightPartials, Weights, CORNERS};
use crate::Interpolation;
use difflut_core::{Grid, GridShape, Result};

/// Numerator of the bin size; slightly above 1 so that the top of the input
/// range maps below the last vertex index.
pub const BINSIZE_NUMERATOR: f32 = 1.000001;

/// Derived constants for a grid of dimension `D`.
///
/// Carries nothing that cannot be recomputed from `D`; forward and backward
/// each build one from the grid dimension they see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinGeometry {
    dim: usize,
    binsize: f32,
    shift: usize,
    corner_offsets: [usize; CORNERS],
}

/// Integer cell coordinates plus the position inside the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Lower corner `(r_id, g_id, b_id)`, each in `[0, D-2]`
    pub index: [usize; 3],
    /// Fraction along each axis; in `[0, 1)` for in-range input
    pub frac: [f32; 3],
}

/// The 8 vertices touched by one sample and their weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Flat vertex offsets within one channel sub-grid
    pub vertices: [usize; CORNERS],
    /// Interpolation weight of each vertex
    pub weights: Weights,
}

impl BinGeometry {
    /// Builds the geometry for a grid with `dim` vertices per axis.
    pub fn new(dim: usize) -> Result<Self> {
        GridShape::validated(dim)?;
        Ok(Self::with_dim(dim))
    }

    /// Geometry of an existing grid.
    pub fn of(grid: &Grid) -> Self {
        // A Grid cannot hold fewer than MIN_GRID_DIM vertices per axis.
        Self::with_dim(grid.dim())
    }

    fn with_dim(dim: usize) -> Self {
        let shape = GridShape::new(dim);
        let mut corner_offsets = [0usize; CORNERS];
        for (k, offset) in corner_offsets.iter_mut().enumerate() {
            let [dr, dg, db] = corner_offset(k);
            *offset = shape.vertex(dr, dg, db);
        }
        Self {
            dim,
            binsize: BINSIZE_NUMERATOR / (dim - 1) as f32,
            shift: shape.shift(),
            corner_offsets,
        }
    }

    /// Vertices per axis.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Width of one cell in normalized input space.
    #[inline]
    pub fn binsize(&self) -> f32 {
        self.binsize
    }

    /// Stride between output-channel sub-grids (`D^3`).
    #[inline]
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Grid shape this geometry addresses.
    #[inline]
    pub fn grid_shape(&self) -> GridShape {
        GridShape::new(self.dim)
    }

    /// Cell index and fraction along one axis.
    #[inline]
    pub fn axis(&self, value: f32) -> (usize, f32) {
        let scaled = value / self.binsize;
        let max_id = (self.dim - 2) as f32;
        // NaN propagates into the fraction; the index falls back to 0.
        let id = scaled.floor().clamp(0.0, max_id);
        let id = if id.is_nan() { 0.0 } else { id };
        (id as usize, scaled - id)
    }

    /// Locates the cell containing `rgb`.
    #[inline]
    pub fn locate(&self, rgb: [f32; 3]) -> Cell {
        let (r_id, rd) = self.axis(rgb[0]);
        let (g_id, gd) = self.axis(rgb[1]);
        let (b_id, bd) = self.axis(rgb[2]);
        Cell {
            index: [r_id, g_id, b_id],
            frac: [rd, gd, bd],
        }
    }

    /// Flat vertex offsets of the 8 corners of `cell`.
    #[inline]
    pub fn vertices(&self, cell: &Cell) -> [usize; CORNERS] {
        let [r, g, b] = cell.index;
        let base = self.grid_shape().vertex(r, g, b);
        self.corner_offsets.map(|offset| base + offset)
    }

    /// Vertices and weights for one sample.
    #[inline]
    pub fn footprint(&self, interpolation: Interpolation, rgb: [f32; 3]) -> Footprint {
        let cell = self.locate(rgb);
        Footprint {
            vertices: self.vertices(&cell),
            weights: weights::weights(interpolation, cell.frac),
        }
    }

    /// Weight derivatives w.r.t. the input color (not the fraction).
    ///
    /// `frac = c / binsize - id`, so every fraction partial is scaled by
    /// `1 / binsize`.
    pub fn input_partials(&self, interpolation: Interpolation, cell: &Cell) -> WeightPartials {
        let scale = 1.0 / self.binsize;
        let mut p = weights::weight_partials(interpolation, cell.frac);
        for pk in p.iter_mut() {
            for v in pk.iter_mut() {
                *v *= scale;
            }
        }
        p
    }

    /// Normalized input color sitting exactly on vertex index `i`.
    #[inline]
    pub fn vertex_color(&self, i: usize) -> f32 {
        i as f32 * self.binsize
    }
}

impl Footprint {
    /// Interpolates one channel sub-grid at this footprint.
    #[inline]
    pub fn sample(&self, channel: &[f32]) -> f32 {
        let mut acc = 0.0f32;
        for k in 0..CORNERS {
            acc += self.weights[k] * channel[self.vertices[k]];
        }
        acc
    }
}

/// A grid that maps every in-range color onto itself.
///
/// `Grid[c, i, j, k] = (i, j, k)[c] * binsize`.
///
/// # Example
///
/// ```rust
/// use difflut_lut::identity_grid;
///
/// let grid = identity_grid(17).unwrap();
/// assert_eq!(grid.get(0, 0, 5, 9), 0.0);
/// ```
pub fn identity_grid(dim: usize) -> Result<Grid> {
    let geometry = BinGeometry::new(dim)?;
    Grid::from_fn(dim, |r, g, b| {
        [
            geometry.vertex_color(r),
            geometry.vertex_color(g),
            geometry.vertex_color(b),
        ]
    })
}
