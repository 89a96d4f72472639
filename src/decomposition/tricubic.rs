//! Tricubic interpolation of a scalar field sampled on a regular grid.
//!
//! Catmull-Rom convolution, evaluated axis by axis over a 4x4x4 stencil. The
//! resulting field is C1 across cell boundaries and reproduces linear fields
//! exactly.

use crate::math::{Real, Vector};

fn catmull_rom(p: [Real; 4], t: Real) -> Real {
    0.5 * (2.0 * p[1]
        + (p[2] - p[0]) * t
        + (2.0 * p[0] - 5.0 * p[1] + 4.0 * p[2] - p[3]) * t * t
        + (3.0 * (p[1] - p[2]) + p[3] - p[0]) * t * t * t)
}

fn collapse_z(stencil: &[[[Real; 4]; 4]; 4], t: Real) -> [[Real; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            out[i][j] = catmull_rom(stencil[i][j], t);
        }
    }
    out
}

fn collapse_y(plane: &[[Real; 4]; 4], t: Real) -> [Real; 4] {
    let mut out = [0.0; 4];
    for i in 0..4 {
        out[i] = catmull_rom(plane[i], t);
    }
    out
}

/// Interpolates the field at parameter `t` (componentwise in `[0, 1]`) inside
/// the cell whose 4x4x4 neighborhood is `stencil`.
///
/// `stencil[i][j][k]` holds the sample at offset `(i - 1, j - 1, k - 1)` from
/// the cell origin.
pub(crate) fn interpolate(stencil: &[[[Real; 4]; 4]; 4], t: &Vector<Real>) -> Real {
    let plane = collapse_z(stencil, t.z);
    let line = collapse_y(&plane, t.y);
    catmull_rom(line, t.x)
}
