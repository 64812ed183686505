//! Grid info command.
//!
//! Displays the bin geometry of a grid dimension and what a LUT of that size
//! costs in memory: the grid, its gradient, and the per-worker scatter
//! buffers.

use crate::InfoArgs;
use anyhow::{Context, Result};
use difflut_lut::BinGeometry;
use serde::Serialize;

/// Geometry and memory numbers for one grid dimension.
#[derive(Debug, Serialize)]
pub struct GridInfo {
    pub dim: usize,
    pub cells_per_axis: usize,
    pub binsize: f32,
    pub shift: usize,
    pub values: usize,
    pub grid_bytes: u64,
    pub parameter_bytes: u64,
    pub threads: usize,
    pub scatter_scratch_bytes: u64,
}

impl GridInfo {
    pub fn new(dim: usize, threads: usize) -> Result<Self> {
        let geometry =
            BinGeometry::new(dim).with_context(|| format!("Invalid grid dimension: {dim}"))?;
        let values = geometry.grid_shape().len();
        let grid_bytes = (values * std::mem::size_of::<f32>()) as u64;
        Ok(Self {
            dim,
            cells_per_axis: dim - 1,
            binsize: geometry.binsize(),
            shift: geometry.shift(),
            values,
            grid_bytes,
            parameter_bytes: 2 * grid_bytes,
            threads,
            // One private gradient grid per worker, and one for the reduce.
            scatter_scratch_bytes: (threads as u64 + 1) * grid_bytes,
        })
    }
}

/// Runs the info command.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    let info = GridInfo::new(args.dim, rayon::current_num_threads())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Grid (3, {d}, {d}, {d})", d = info.dim);
    println!("  Cells/axis: {}", info.cells_per_axis);
    println!("  Binsize:    {:.9}", info.binsize);
    println!("  Shift:      {}", info.shift);
    println!("  Values:     {}", info.values);
    println!("  Grid:       {}", super::format_size(info.grid_bytes));
    println!("  Grid+grad:  {}", super::format_size(info.parameter_bytes));

    if verbose > 0 {
        println!("  Threads:    {}", info.threads);
        println!(
            "  Scratch:    {} (per-worker scatter)",
            super::format_size(info.scatter_scratch_bytes)
        );
    }

    Ok(())
}
