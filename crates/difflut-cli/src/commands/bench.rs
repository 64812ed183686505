//! Kernel timing command.

use super::RandomData;
use crate::BenchArgs;
use anyhow::{Result, bail};
use difflut_core::Grid;
use difflut_ops::LutFunction;
use std::time::{Duration, Instant};
use tracing::info;

/// Runs the bench command, timing forward and backward separately.
pub fn run(args: BenchArgs, verbose: u8) -> Result<()> {
    if args.iters == 0 {
        bail!("--iters must be at least 1");
    }
    let config = super::kernel_config(&args.kernel)?;
    let mut data = RandomData::new(&args.data)?;
    let grads = data.gradient();
    let function = LutFunction::new(config);
    let pixels = data.images.shape().pixel_count();

    info!(pixels, iters = args.iters, scatter = %config.scatter, "Benchmarking");
    println!(
        "Grid (3, {d}, {d}, {d}), batch {}, {} pixels, {} threads",
        data.images.shape(),
        pixels,
        rayon::current_num_threads(),
        d = data.grid.dim()
    );
    println!(
        "  interpolation {}, scatter {}, input gradient {}",
        config.interpolation, config.scatter, config.input_gradient
    );

    // Warm-up
    let fwd = function.forward(&data.grid, &data.images)?;
    let context = fwd.context;

    let mut forward = Duration::ZERO;
    for _ in 0..args.iters {
        let start = Instant::now();
        function.forward(&data.grid, &data.images)?;
        forward += start.elapsed();
    }

    let mut grid_grad = Grid::zeros(data.grid.dim())?;
    let mut backward = Duration::ZERO;
    for _ in 0..args.iters {
        grid_grad.fill(0.0);
        let start = Instant::now();
        function.backward(&context, &data.grid, &data.images, &grads, &mut grid_grad)?;
        backward += start.elapsed();
    }

    report("forward", forward, args.iters, pixels, verbose);
    report("backward", backward, args.iters, pixels, verbose);
    Ok(())
}

fn report(name: &str, total: Duration, iters: usize, pixels: usize, verbose: u8) {
    let per_iter = total.as_secs_f64() / iters as f64;
    let mpix = if per_iter > 0.0 {
        pixels as f64 / per_iter / 1e6
    } else {
        f64::INFINITY
    };
    println!("  {name:<9} {:>10.3} ms/iter  {:>10.2} Mpix/s", per_iter * 1e3, mpix);
    if verbose > 0 {
        println!("  {name:<9} total {:.3} s over {iters} iterations", total.as_secs_f64());
    }
}
