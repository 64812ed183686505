//! End-to-end use of the layer and function API.

use approx::assert_abs_diff_eq;
use difflut_core::{Grid, ImageBatch};
use difflut_lut::{identity_grid, Interpolation};
use difflut_ops::{InputGradient, KernelConfig, LutFunction, LutLayer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn squared_error(output: &ImageBatch, target: &ImageBatch) -> (f32, ImageBatch) {
    let mut grad = output.clone();
    let mut loss = 0.0;
    for (g, t) in grad.data_mut().iter_mut().zip(target.data()) {
        *g -= t;
        loss += 0.5 * *g * *g;
    }
    (loss, grad)
}

#[test]
fn gradient_descent_fits_identity() {
    let mut rng = StdRng::seed_from_u64(11);
    let images = ImageBatch::from_fn(1, 8, 8, |_, _, _| [rng.random(), rng.random(), rng.random()]);
    let mut layer = LutLayer::new(5).unwrap();
    let lr = 0.01;

    let mut losses = Vec::new();
    for _ in 0..100 {
        let output = layer.forward(&images).unwrap();
        let (loss, grad) = squared_error(&output, &images);
        losses.push(loss);

        layer.zero_grad();
        layer.backward(&grad).unwrap();
        let param = layer.param_mut();
        let step: Vec<f32> = param.grad().data().iter().map(|g| lr * g).collect();
        for (v, s) in param.value_mut().data_mut().iter_mut().zip(step) {
            *v -= s;
        }
    }

    for pair in losses.windows(2) {
        assert!(pair[1] <= pair[0] * (1.0 + 1e-4), "loss went up: {pair:?}");
    }
    assert!(losses[99] < losses[0]);
}

#[test]
fn geometric_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(12);
    let grid = Grid::from_fn(6, |_, _, _| [rng.random(), rng.random(), rng.random()]).unwrap();

    // Interior points away from cell faces and tetrahedron boundaries.
    let colors = [[0.13, 0.47, 0.71], [0.55, 0.31, 0.09], [0.86, 0.69, 0.27]];
    let out_grad = [0.3f32, -0.8, 0.6];

    for interp in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
        let config = KernelConfig::default()
            .with_interpolation(interp)
            .with_input_gradient(InputGradient::Geometric);
        let function = LutFunction::new(config);

        let loss = |rgb: [f32; 3]| -> f64 {
            let batch = ImageBatch::from_fn(1, 1, 1, |_, _, _| rgb);
            let out = function.forward(&grid, &batch).unwrap().output;
            (0..3)
                .map(|c| f64::from(out.get(0, c, 0, 0)) * f64::from(out_grad[c]))
                .sum()
        };

        for rgb in colors {
            let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| rgb);
            let grads = ImageBatch::from_fn(1, 1, 1, |_, _, _| out_grad);
            let fwd = function.forward(&grid, &images).unwrap();
            let mut grid_grad = Grid::zeros(6).unwrap();
            let input_grad = function
                .backward(&fwd.context, &grid, &images, &grads, &mut grid_grad)
                .unwrap();

            let h = 1e-3f32;
            for j in 0..3 {
                let mut plus = rgb;
                let mut minus = rgb;
                plus[j] += h;
                minus[j] -= h;
                let numeric = (loss(plus) - loss(minus)) / (2.0 * f64::from(h));
                assert_abs_diff_eq!(
                    f64::from(input_grad.get(0, j, 0, 0)),
                    numeric,
                    epsilon = 2e-2
                );
            }
        }
    }
}

#[test]
fn grid_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(13);
    let dim = 4;
    let grid = Grid::from_fn(dim, |_, _, _| [rng.random(), rng.random(), rng.random()]).unwrap();
    let images = ImageBatch::from_fn(2, 3, 3, |_, _, _| [rng.random(), rng.random(), rng.random()]);
    let target = ImageBatch::from_fn(2, 3, 3, |_, _, _| [rng.random(), rng.random(), rng.random()]);
    let function = LutFunction::default();

    let loss_of = |g: &Grid| squared_error(&function.forward(g, &images).unwrap().output, &target);
    let (_, grad) = loss_of(&grid);
    let fwd = function.forward(&grid, &images).unwrap();
    let mut grid_grad = Grid::zeros(dim).unwrap();
    function
        .backward(&fwd.context, &grid, &images, &grad, &mut grid_grad)
        .unwrap();

    let h = 1e-2;
    for i in (0..grid.data().len()).step_by(7) {
        let mut plus = grid.clone();
        let mut minus = grid.clone();
        plus.data_mut()[i] += h;
        minus.data_mut()[i] -= h;
        let numeric = (loss_of(&plus).0 - loss_of(&minus).0) / (2.0 * h);
        assert_abs_diff_eq!(grid_grad.data()[i], numeric, epsilon = 2e-3);
    }
}

#[test]
fn trained_identity_is_stable() {
    let grid = identity_grid(9).unwrap();
    let mut layer = LutLayer::with_grid(grid.clone(), KernelConfig::default()).unwrap();
    let images = ImageBatch::from_fn(2, 6, 6, |n, x, y| {
        [x as f32 / 5.0, y as f32 / 5.0, n as f32 * 0.9]
    });
    let output = layer.forward(&images).unwrap();
    let (loss, grad) = squared_error(&output, &images);
    assert!(loss < 1e-8);
    layer.backward(&grad).unwrap();
    for v in layer.param().grad().data() {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-4);
    }
    assert_eq!(layer.param().value(), &grid);
}
