//! Per-pixel maps over planar RGB batches.
//!
//! Reads the three channel planes of each pixel, calls a kernel, and writes
//! three values back into the matching planes of the destination. With the
//! `parallel` feature, images are split into spans of pixels and each span
//! runs as its own rayon task.

use difflut_core::BatchShape;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Pixels per parallel task.
#[cfg(feature = "parallel")]
pub(crate) const SPAN: usize = 1024;

/// Reads the 3 channel values of pixel `p` from one planar image.
#[inline]
pub(crate) fn read_rgb(image: &[f32], plane: usize, p: usize) -> [f32; 3] {
    [image[p], image[p + plane], image[p + 2 * plane]]
}

/// Applies `f(rgb, aux_rgb)` to every pixel, writing into `dst`.
///
/// `src`, `aux` and `dst` all have `shape`, which must have 3 channels.
/// When `aux` is `None` the kernel receives zeros in its place.
pub(crate) fn map_pixels<F>(
    shape: BatchShape,
    src: &[f32],
    aux: Option<&[f32]>,
    dst: &mut [f32],
    parallel: bool,
    f: F,
) where
    F: Fn([f32; 3], [f32; 3]) -> [f32; 3] + Sync,
{
    if shape.is_empty() {
        return;
    }
    let plane = shape.plane_len();
    let image_len = shape.image_len();

    #[cfg(feature = "parallel")]
    if parallel {
        dst.par_chunks_mut(image_len)
            .enumerate()
            .for_each(|(n, out)| {
                let range = n * image_len..(n + 1) * image_len;
                let src = &src[range.clone()];
                let aux = aux.map(|a| &a[range]);
                let (r, rest) = out.split_at_mut(plane);
                let (g, b) = rest.split_at_mut(plane);
                r.par_chunks_mut(SPAN)
                    .zip(g.par_chunks_mut(SPAN))
                    .zip(b.par_chunks_mut(SPAN))
                    .enumerate()
                    .for_each(|(i, ((r, g), b))| {
                        map_span(src, aux, plane, i * SPAN, [r, g, b], &f);
                    });
            });
        return;
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    for (n, out) in dst.chunks_mut(image_len).enumerate() {
        let range = n * image_len..(n + 1) * image_len;
        let src = &src[range.clone()];
        let aux = aux.map(|a| &a[range]);
        let (r, rest) = out.split_at_mut(plane);
        let (g, b) = rest.split_at_mut(plane);
        map_span(src, aux, plane, 0, [r, g, b], &f);
    }
}

/// Runs `f` over pixels `start..start + out[0].len()` of one image.
#[inline]
fn map_span<F>(
    src: &[f32],
    aux: Option<&[f32]>,
    plane: usize,
    start: usize,
    out: [&mut [f32]; 3],
    f: &F,
) where
    F: Fn([f32; 3], [f32; 3]) -> [f32; 3],
{
    let [r, g, b] = out;
    for j in 0..r.len() {
        let p = start + j;
        let rgb = read_rgb(src, plane, p);
        let extra = aux.map_or([0.0; 3], |a| read_rgb(a, plane, p));
        let v = f(rgb, extra);
        r[j] = v[0];
        g[j] = v[1];
        b[j] = v[2];
    }
}
