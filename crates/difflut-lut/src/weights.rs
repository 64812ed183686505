//! Corner weights inside one grid cell.
//!
//! Corners are numbered by their offset bits, R highest:
//!
//! ```text
//! corner k = (dr << 2) | (dg << 1) | db
//!
//!   0: (0,0,0)  1: (0,0,1)  2: (0,1,0)  3: (0,1,1)
//!   4: (1,0,0)  5: (1,0,1)  6: (1,1,0)  7: (1,1,1)
//! ```
//!
//! Both interpolation methods return all 8 weights so that forward and
//! backward can walk the same corner list regardless of method. Tetrahedral
//! weights are zero on the 4 corners outside the selected tetrahedron.

use crate::Interpolation;

/// Number of corners of a grid cell.
pub const CORNERS: usize = 8;

/// One weight per cell corner.
pub type Weights = [f32; CORNERS];

/// Partial derivatives of each corner weight w.r.t. the R, G, B fractions.
pub type WeightPartials = [[f32; 3]; CORNERS];

/// Offset bit for each axis in a corner index.
const AXIS_BIT: [usize; 3] = [4, 2, 1];

/// Offset `(dr, dg, db)` of corner `k`.
#[inline]
pub const fn corner_offset(k: usize) -> [usize; 3] {
    [(k >> 2) & 1, (k >> 1) & 1, k & 1]
}

/// Corner weights for the fractional position `frac` inside a cell.
#[inline]
pub fn weights(interpolation: Interpolation, frac: [f32; 3]) -> Weights {
    match interpolation {
        Interpolation::Trilinear => trilinear_weights(frac),
        Interpolation::Tetrahedral => tetrahedral_weights(frac),
    }
}

/// Derivatives of [`weights`] with respect to `frac`.
///
/// Tetrahedral weights are piecewise linear, so their partials are constant
/// inside each tetrahedron.
pub fn weight_partials(interpolation: Interpolation, frac: [f32; 3]) -> WeightPartials {
    match interpolation {
        Interpolation::Trilinear => trilinear_partials(frac),
        Interpolation::Tetrahedral => tetrahedral_partials(frac),
    }
}

/// `w(dr,dg,db) = (dr ? rd : 1-rd) * (dg ? gd : 1-gd) * (db ? bd : 1-bd)`
pub fn trilinear_weights(frac: [f32; 3]) -> Weights {
    let [rd, gd, bd] = frac;
    let r = [1.0 - rd, rd];
    let g = [1.0 - gd, gd];
    let b = [1.0 - bd, bd];

    let mut w = [0.0f32; CORNERS];
    for (k, wk) in w.iter_mut().enumerate() {
        let [dr, dg, db] = corner_offset(k);
        *wk = r[dr] * g[dg] * b[db];
    }
    w
}

fn trilinear_partials(frac: [f32; 3]) -> WeightPartials {
    let [rd, gd, bd] = frac;
    let r = [1.0 - rd, rd];
    let g = [1.0 - gd, gd];
    let b = [1.0 - bd, bd];
    let sign = [-1.0f32, 1.0];

    let mut p = [[0.0f32; 3]; CORNERS];
    for (k, pk) in p.iter_mut().enumerate() {
        let [dr, dg, db] = corner_offset(k);
        *pk = [
            sign[dr] * g[dg] * b[db],
            r[dr] * sign[dg] * b[db],
            r[dr] * g[dg] * sign[db],
        ];
    }
    p
}

/// Axes sorted by descending fraction, with ties broken the same way as the
/// classic six-tetrahedron split.
fn tetrahedron_order(frac: [f32; 3]) -> [usize; 3] {
    let [rf, gf, bf] = frac;
    if rf > gf {
        if gf > bf {
            [0, 1, 2]
        } else if rf > bf {
            [0, 2, 1]
        } else {
            [2, 0, 1]
        }
    } else if gf > bf {
        if rf > bf { [1, 0, 2] } else { [1, 2, 0] }
    } else {
        [2, 1, 0]
    }
}

/// The 4 corners visited walking from (0,0,0) to (1,1,1) along `order`.
fn tetrahedron_path(order: [usize; 3]) -> [usize; 4] {
    let first = AXIS_BIT[order[0]];
    let second = first | AXIS_BIT[order[1]];
    [0, first, second, CORNERS - 1]
}

/// With `x1 >= x2 >= x3` the fractions along `order`, the path corners
/// weigh `1-x1, x1-x2, x2-x3, x3`.
pub fn tetrahedral_weights(frac: [f32; 3]) -> Weights {
    let order = tetrahedron_order(frac);
    let path = tetrahedron_path(order);
    let [x1, x2, x3] = order.map(|axis| frac[axis]);

    let mut w = [0.0f32; CORNERS];
    w[path[0]] = 1.0 - x1;
    w[path[1]] = x1 - x2;
    w[path[2]] = x2 - x3;
    w[path[3]] = x3;
    w
}

fn tetrahedral_partials(frac: [f32; 3]) -> WeightPartials {
    let order = tetrahedron_order(frac);
    let path = tetrahedron_path(order);

    let mut p = [[0.0f32; 3]; CORNERS];
    p[path[0]][order[0]] = -1.0;
    p[path[1]][order[0]] = 1.0;
    p[path[1]][order[1]] = -1.0;
    p[path[2]][order[1]] = 1.0;
    p[path[2]][order[2]] = -1.0;
    p[path[3]][order[2]] = 1.0;
    p
}
