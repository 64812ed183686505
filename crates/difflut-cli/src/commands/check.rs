//! Kernel self-check command.
//!
//! Runs forward and backward on a seeded random grid and batch and verifies
//! the properties the kernels guarantee: weights form a partition of unity,
//! the identity grid is the identity, vertices are hit exactly, backward
//! scatters the weights forward used, gradient mass is conserved, and the
//! grid gradient agrees with finite differences.

use super::RandomData;
use crate::{CheckArgs, DataArgs};
use anyhow::{Result, bail};
use difflut_core::{BatchShape, Grid, ImageBatch};
use difflut_lut::{identity_grid, BinGeometry, Interpolation, CORNERS};
use difflut_ops::{
    GradientScatterer, InputGradient, KernelConfig, LutFunction, Sampler, ScatterStrategy,
};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Pixels probed by the per-pixel checks.
const PROBES: usize = 16;
/// Step for finite differences on grid values.
const GRID_STEP: f32 = 1e-2;
/// Step for finite differences on input colors.
const COLOR_STEP: f32 = 1e-3;

/// Outcome of one property check.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn tolerance(name: &'static str, error: f64, tolerance: f64) -> Self {
        Self {
            name,
            passed: error <= tolerance,
            detail: format!("max error {error:.3e} (tolerance {tolerance:.0e})"),
        }
    }

    fn flag(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed,
            detail: detail.into(),
        }
    }
}

/// All checks for one configuration.
#[derive(Debug, Serialize)]
pub struct Report {
    pub dim: usize,
    pub batch: usize,
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    pub interpolation: Interpolation,
    pub scatter: ScatterStrategy,
    pub input_gradient: InputGradient,
    pub checks: Vec<Check>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Runs the check command.
pub fn run(args: CheckArgs, verbose: u8) -> Result<()> {
    let config = super::kernel_config(&args.kernel)?;
    let report = run_checks(&args.data, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report, verbose);
    }

    let failed = report.failed();
    if failed > 0 {
        bail!("{} of {} checks failed", failed, report.checks.len());
    }
    Ok(())
}

fn print_text(report: &Report, verbose: u8) {
    println!(
        "Grid (3, {d}, {d}, {d}), batch ({}, 3, {}, {}), seed {}",
        report.batch,
        report.width,
        report.height,
        report.seed,
        d = report.dim
    );
    if verbose > 0 {
        println!(
            "  interpolation {}, scatter {}, input gradient {}",
            report.interpolation, report.scatter, report.input_gradient
        );
    }
    for check in &report.checks {
        let status = if check.passed { "ok  " } else { "FAIL" };
        println!("  {status} {:<20} {}", check.name, check.detail);
    }
}

/// Runs every check on seeded random data.
pub fn run_checks(data: &DataArgs, config: KernelConfig) -> Result<Report> {
    let mut checker = Checker::new(data, config)?;
    info!(dim = data.dim, seed = data.seed, "Running kernel checks");

    let checks = vec![
        checker.weight_sum(),
        checker.identity()?,
        checker.vertex_exact()?,
        checker.consistency()?,
        checker.invalid_shape(),
        checker.shape_mismatch()?,
        checker.corner_mean()?,
        checker.conservation()?,
        checker.strategies_agree()?,
        checker.grid_finite_difference()?,
        checker.input_gradient()?,
    ];
    for check in &checks {
        debug!(name = check.name, passed = check.passed, detail = %check.detail, "Check");
    }

    Ok(Report {
        dim: data.dim,
        batch: data.batch,
        width: data.width,
        height: data.height,
        seed: data.seed,
        interpolation: config.interpolation,
        scatter: config.scatter,
        input_gradient: config.input_gradient,
        checks,
    })
}

struct Checker {
    data: RandomData,
    config: KernelConfig,
    geometry: BinGeometry,
    function: LutFunction,
}

impl Checker {
    fn new(args: &DataArgs, config: KernelConfig) -> Result<Self> {
        let data = RandomData::new(args)?;
        let geometry = BinGeometry::of(&data.grid);
        Ok(Self {
            data,
            config,
            geometry,
            function: LutFunction::new(config),
        })
    }

    fn interpolation(&self) -> Interpolation {
        self.config.interpolation
    }

    fn pixels(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        let shape = self.data.images.shape();
        (0..shape.batch).flat_map(move |n| {
            (0..shape.width).flat_map(move |x| {
                (0..shape.height).map(move |y| self.data.images.rgb(n, x, y))
            })
        })
    }

    fn weight_sum(&self) -> Check {
        let error = self
            .pixels()
            .map(|rgb| {
                let sum: f32 = self.geometry.footprint(self.interpolation(), rgb).weights.iter().sum();
                f64::from((sum - 1.0).abs())
            })
            .fold(0.0, f64::max);
        Check::tolerance("weight_sum", error, 1e-5)
    }

    fn identity(&self) -> Result<Check> {
        let grid = identity_grid(self.data.grid.dim())?;
        let output = self.function.forward(&grid, &self.data.images)?.output;
        Ok(Check::tolerance(
            "identity",
            max_abs_diff(output.data(), self.data.images.data()),
            1e-4,
        ))
    }

    fn vertex_exact(&mut self) -> Result<Check> {
        let dim = self.data.grid.dim();
        let vertices: Vec<[usize; 3]> = (0..PROBES * 4)
            .map(|_| {
                let rng = &mut self.data.rng;
                [rng.random_range(0..dim), rng.random_range(0..dim), rng.random_range(0..dim)]
            })
            .collect();
        let geometry = self.geometry;
        let images = ImageBatch::from_fn(1, vertices.len(), 1, |_, x, _| {
            vertices[x].map(|i| geometry.vertex_color(i))
        });
        let output = self.function.forward(&self.data.grid, &images)?.output;

        let mut error = 0.0f64;
        for (x, [r, g, b]) in vertices.iter().copied().enumerate() {
            for c in 0..3 {
                let diff = output.get(0, c, x, 0) - self.data.grid.get(c, r, g, b);
                error = error.max(f64::from(diff.abs()));
            }
        }
        Ok(Check::tolerance("vertex_exact", error, 1e-5))
    }

    fn consistency(&self) -> Result<Check> {
        let dim = self.data.grid.dim();
        let mut error = 0.0f64;
        for rgb in self.pixels().take(PROBES) {
            let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| rgb);
            let fwd = self.function.forward(&self.data.grid, &images)?;
            let grads = ImageBatch::filled(images.shape(), 1.0);
            let mut grid_grad = Grid::zeros(dim)?;
            self.function
                .backward(&fwd.context, &self.data.grid, &images, &grads, &mut grid_grad)?;

            let fp = self.geometry.footprint(self.interpolation(), rgb);
            for c in 0..3 {
                for k in 0..CORNERS {
                    let diff = grid_grad.channel(c)[fp.vertices[k]] - fp.weights[k];
                    error = error.max(f64::from(diff.abs()));
                }
            }
        }
        Ok(Check::tolerance("consistency", error, 1e-6))
    }

    fn invalid_shape(&self) -> Check {
        let images = ImageBatch::zeros(BatchShape::new(1, 4, 2, 2));
        match self.function.forward(&self.data.grid, &images) {
            Err(e) if e.is_invalid_shape() => Check::flag("invalid_shape", true, e.to_string()),
            Err(e) => Check::flag("invalid_shape", false, format!("wrong error: {e}")),
            Ok(_) => Check::flag("invalid_shape", false, "4-channel batch was accepted"),
        }
    }

    fn shape_mismatch(&self) -> Result<Check> {
        let images = &self.data.images;
        let fwd = self.function.forward(&self.data.grid, images)?;
        let shape = images.shape();
        let bad = ImageBatch::zeros(BatchShape::rgb(shape.batch, shape.width + 1, shape.height));
        let mut grid_grad = Grid::zeros(self.data.grid.dim())?;
        let result = self
            .function
            .backward(&fwd.context, &self.data.grid, images, &bad, &mut grid_grad);
        Ok(match result {
            Err(e) if e.is_shape_mismatch() => Check::flag("shape_mismatch", true, e.to_string()),
            Err(e) => Check::flag("shape_mismatch", false, format!("wrong error: {e}")),
            Ok(_) => Check::flag("shape_mismatch", false, "mismatched gradient was accepted"),
        })
    }

    fn corner_mean(&mut self) -> Result<Check> {
        let grid = super::random_grid(&mut self.data.rng, 2)?;
        let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| [0.5, 0.5, 0.5]);
        let output = self.function.forward(&grid, &images)?.output;
        let mut error = 0.0f64;
        for c in 0..3 {
            let corners = grid.channel(c);
            let expected = match self.interpolation() {
                Interpolation::Trilinear => corners.iter().sum::<f32>() / CORNERS as f32,
                // The grey diagonal splits evenly between the black and white corners.
                Interpolation::Tetrahedral => 0.5 * (corners[0] + corners[CORNERS - 1]),
            };
            error = error.max(f64::from((output.get(0, c, 0, 0) - expected).abs()));
        }
        Ok(Check::tolerance("corner_mean", error, 1e-5))
    }

    fn conservation(&mut self) -> Result<Check> {
        let grads = self.data.gradient();
        let fwd = self.function.forward(&self.data.grid, &self.data.images)?;
        let mut grid_grad = Grid::zeros(self.data.grid.dim())?;
        self.function.backward(
            &fwd.context,
            &self.data.grid,
            &self.data.images,
            &grads,
            &mut grid_grad,
        )?;

        let incoming = grads.channel_sums();
        let scattered = grid_grad.channel_sums();
        let scale = grads.data().iter().map(|g| f64::from(g.abs())).sum::<f64>().max(1.0);
        let error = (0..3)
            .map(|c| f64::from((incoming[c] - scattered[c]).abs()))
            .fold(0.0, f64::max);
        Ok(Check::tolerance("conservation", error / scale, 1e-5))
    }

    fn strategies_agree(&mut self) -> Result<Check> {
        let grads = self.data.gradient();
        let (ctx, _) = Sampler::new(self.config).forward(&self.data.grid, &self.data.images)?;

        let mut results = Vec::new();
        for strategy in [ScatterStrategy::Serial, ScatterStrategy::PerWorker, ScatterStrategy::Atomic] {
            let config = self.config.with_scatter(strategy).with_min_parallel_pixels(1);
            let mut grid_grad = Grid::zeros(self.data.grid.dim())?;
            GradientScatterer::new(config).scatter(&ctx, &self.data.images, &grads, &mut grid_grad)?;
            results.push(grid_grad);
        }
        let scale = results[0]
            .data()
            .iter()
            .fold(1.0f32, |m, v| m.max(v.abs()));
        let error = results[1..]
            .iter()
            .map(|other| max_abs_diff(results[0].data(), other.data()))
            .fold(0.0, f64::max);
        Ok(Check::tolerance("strategies_agree", error / f64::from(scale), 1e-4))
    }

    /// `L = sum(output * G)` is linear in the grid, so central differences
    /// must reproduce the scattered gradient.
    fn grid_finite_difference(&mut self) -> Result<Check> {
        let grads = self.data.gradient();
        let dim = self.data.grid.dim();
        let fwd = self.function.forward(&self.data.grid, &self.data.images)?;
        let mut grid_grad = Grid::zeros(dim)?;
        self.function.backward(
            &fwd.context,
            &self.data.grid,
            &self.data.images,
            &grads,
            &mut grid_grad,
        )?;

        // Probe vertices some pixel actually touches.
        let shift = self.geometry.shift();
        let colors: Vec<[f32; 3]> = self.pixels().take(PROBES).collect();
        let mut probes = Vec::new();
        for rgb in colors {
            let fp = self.geometry.footprint(self.interpolation(), rgb);
            let k = self.data.rng.random_range(0..CORNERS);
            let c = self.data.rng.random_range(0..3);
            probes.push(c * shift + fp.vertices[k]);
        }

        let mut error = 0.0f64;
        for index in probes {
            let mut plus = self.data.grid.clone();
            let mut minus = self.data.grid.clone();
            plus.data_mut()[index] += GRID_STEP;
            minus.data_mut()[index] -= GRID_STEP;
            let out_plus = self.function.forward(&plus, &self.data.images)?.output;
            let out_minus = self.function.forward(&minus, &self.data.images)?.output;

            let delta: f64 = out_plus
                .data()
                .iter()
                .zip(out_minus.data())
                .zip(grads.data())
                .map(|((a, b), g)| (f64::from(*a) - f64::from(*b)) * f64::from(*g))
                .sum();
            let numeric = delta / (2.0 * f64::from(GRID_STEP));
            let analytic = f64::from(grid_grad.data()[index]);
            error = error.max((numeric - analytic).abs() / (1.0 + analytic.abs()));
        }
        Ok(Check::tolerance("grid_fd", error, 1e-2))
    }

    fn input_gradient(&mut self) -> Result<Check> {
        match self.config.input_gradient {
            InputGradient::PassThrough => self.pass_through(),
            InputGradient::Geometric => self.input_finite_difference(),
        }
    }

    fn pass_through(&mut self) -> Result<Check> {
        let grads = self.data.gradient();
        let fwd = self.function.forward(&self.data.grid, &self.data.images)?;
        let mut grid_grad = Grid::zeros(self.data.grid.dim())?;
        let input_grad = self.function.backward(
            &fwd.context,
            &self.data.grid,
            &self.data.images,
            &grads,
            &mut grid_grad,
        )?;
        Ok(Check::flag(
            "input_gradient",
            input_grad == grads,
            "pass-through returns the output gradient",
        ))
    }

    /// Central differences per input channel, on pixels whose
    /// neighborhood stays inside one cell (and one tetrahedron).
    fn input_finite_difference(&mut self) -> Result<Check> {
        let margin = 2.0 * COLOR_STEP / self.geometry.binsize();
        let tetrahedral = self.interpolation() == Interpolation::Tetrahedral;
        let geometry = self.geometry;
        let interior: Vec<[f32; 3]> = self
            .pixels()
            .filter(|rgb| {
                let frac = geometry.locate(*rgb).frac;
                let in_cell = frac.iter().all(|f| *f > margin && *f < 1.0 - margin);
                let apart = !tetrahedral
                    || ((frac[0] - frac[1]).abs() > margin
                        && (frac[1] - frac[2]).abs() > margin
                        && (frac[0] - frac[2]).abs() > margin);
                in_cell && apart
            })
            .take(PROBES)
            .collect();
        if interior.is_empty() {
            return Ok(Check::flag("input_gradient", true, "no interior pixels to probe"));
        }

        let out_grad: [f32; 3] = [
            self.data.rng.random_range(-1.0..1.0),
            self.data.rng.random_range(-1.0..1.0),
            self.data.rng.random_range(-1.0..1.0),
        ];
        let loss = |rgb: [f32; 3]| -> Result<f64> {
            let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| rgb);
            let out = self.function.forward(&self.data.grid, &images)?.output.rgb(0, 0, 0);
            Ok((0..3).map(|c| f64::from(out[c]) * f64::from(out_grad[c])).sum())
        };

        let mut error = 0.0f64;
        for rgb in &interior {
            let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| *rgb);
            let grads = ImageBatch::from_fn(1, 1, 1, |_, _, _| out_grad);
            let fwd = self.function.forward(&self.data.grid, &images)?;
            let mut grid_grad = Grid::zeros(self.data.grid.dim())?;
            let input_grad = self.function.backward(
                &fwd.context,
                &self.data.grid,
                &images,
                &grads,
                &mut grid_grad,
            )?;
            for j in 0..3 {
                let mut plus = *rgb;
                let mut minus = *rgb;
                plus[j] += COLOR_STEP;
                minus[j] -= COLOR_STEP;
                let numeric = (loss(plus)? - loss(minus)?) / (2.0 * f64::from(COLOR_STEP));
                let analytic = f64::from(input_grad.get(0, j, 0, 0));
                error = error.max((numeric - analytic).abs() / (1.0 + analytic.abs()));
            }
        }
        Ok(Check::tolerance("input_gradient", error, 2e-2))
    }
}

fn max_abs_diff(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from((x - y).abs()))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn data(dim: usize, seed: u64) -> DataArgs {
        DataArgs {
            dim,
            batch: 10,
            width: 4,
            height: 4,
            seed,
        }
    }

    #[test]
    fn test_default_checks_pass() {
        let report = run_checks(&data(17, 0), KernelConfig::default()).unwrap();
        for check in &report.checks {
            assert!(check.passed, "{}: {}", check.name, check.detail);
        }
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn test_tetrahedral_geometric_checks_pass() {
        let config = KernelConfig::default()
            .with_interpolation(Interpolation::Tetrahedral)
            .with_input_gradient(InputGradient::Geometric);
        let report = run_checks(&data(9, 3), config).unwrap();
        for check in &report.checks {
            assert!(check.passed, "{}: {}", check.name, check.detail);
        }
    }

    #[test]
    fn test_center_of_unit_cube_per_interpolation() {
        for interpolation in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
            let config = KernelConfig::default().with_interpolation(interpolation);
            let mut checker = Checker::new(&data(2, 7), config).unwrap();
            let check = checker.corner_mean().unwrap();
            assert!(check.passed, "{}: {}", interpolation.name(), check.detail);
        }
    }

    #[test]
    fn test_tetrahedral_center_is_diagonal_mean() {
        let grid = Grid::from_fn(2, |r, g, b| {
            let v = (r * 4 + g * 2 + b) as f32;
            [v, 2.0 * v, 8.0 - v]
        })
        .unwrap();
        let images = ImageBatch::from_fn(1, 1, 1, |_, _, _| [0.5, 0.5, 0.5]);
        let sampler = Sampler::with_interpolation(Interpolation::Tetrahedral);
        let (_, output) = sampler.forward(&grid, &images).unwrap();
        assert_abs_diff_eq!(output.get(0, 0, 0, 0), 3.5, epsilon = 1e-4);
        assert_abs_diff_eq!(output.get(0, 1, 0, 0), 7.0, epsilon = 1e-4);
        assert_abs_diff_eq!(output.get(0, 2, 0, 0), 4.5, epsilon = 1e-4);
    }

    #[test]
    fn test_small_dim_is_an_error() {
        assert!(run_checks(&data(1, 0), KernelConfig::default()).is_err());
    }

    #[test]
    fn test_report_json() {
        let report = run_checks(&data(5, 1), KernelConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["interpolation"], "trilinear");
        assert_eq!(json["checks"].as_array().unwrap().len(), report.checks.len());
    }
}
