//! Geometric input gradient.
//!
//! Chains the incoming output gradient through the interpolation weights:
//!
//! ```text
//! in_grad[j] = sum_c g[c] * sum_k dW_k/dcolor_j * Grid[c, vertex_k]
//! ```
//!
//! Only used when [`InputGradient::Geometric`](crate::InputGradient) is
//! selected; the default backward passes the output gradient through.

use crate::planar::map_pixels;
use difflut_core::{Grid, ImageBatch};
use difflut_lut::{BinGeometry, Interpolation, CORNERS};
use tracing::trace;

/// Derivative of the loss w.r.t. every input color.
///
/// `images` and `output_grad` must share a 3-channel shape and `geometry`
/// must describe `grid`; callers validate both.
pub(crate) fn input_gradient(
    grid: &Grid,
    geometry: &BinGeometry,
    interpolation: Interpolation,
    images: &ImageBatch,
    output_grad: &ImageBatch,
    parallel: bool,
) -> ImageBatch {
    let shape = images.shape();
    trace!(pixels = shape.pixel_count(), %interpolation, "jacobian::input_gradient");

    let channels = [grid.channel(0), grid.channel(1), grid.channel(2)];
    let mut out = ImageBatch::zeros(shape);
    map_pixels(
        shape,
        images.data(),
        Some(output_grad.data()),
        out.data_mut(),
        parallel,
        |rgb, grad| {
            let cell = geometry.locate(rgb);
            let vertices = geometry.vertices(&cell);
            let partials = geometry.input_partials(interpolation, &cell);

            let mut in_grad = [0.0f32; 3];
            for (c, channel) in channels.iter().enumerate() {
                if grad[c] == 0.0 {
                    continue;
                }
                for k in 0..CORNERS {
                    let v = channel[vertices[k]] * grad[c];
                    for (acc, d) in in_grad.iter_mut().zip(partials[k]) {
                        *acc += d * v;
                    }
                }
            }
            in_grad
        },
    );
    out
}
