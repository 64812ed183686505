//! CLI command implementations

pub mod bench;
pub mod check;
pub mod info;

use crate::{DataArgs, KernelArgs};
use anyhow::{Context, Result, bail};
use difflut_core::{Grid, ImageBatch};
use difflut_ops::KernelConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::debug;

/// Load kernel config from a YAML file
pub fn load_config(path: &Path) -> Result<KernelConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Resolve kernel settings: defaults, then `--config`, then flags.
pub fn kernel_config(args: &KernelArgs) -> Result<KernelConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => KernelConfig::default(),
    };
    if let Some(interp) = args.interp {
        config.interpolation = interp;
    }
    if let Some(strategy) = args.strategy {
        config.scatter = strategy;
    }
    if let Some(input_gradient) = args.input_gradient {
        config.input_gradient = input_gradient;
    }
    if let Some(pixels) = args.min_parallel {
        config.min_parallel_pixels = pixels;
    }
    debug!(?config, "Kernel config");
    Ok(config)
}

/// Seeded random grid and batch for `check` and `bench`.
pub struct RandomData {
    pub rng: StdRng,
    pub grid: Grid,
    pub images: ImageBatch,
}

impl RandomData {
    pub fn new(args: &DataArgs) -> Result<Self> {
        if args.width == 0 || args.height == 0 {
            bail!("Image size must be non-zero, got {}x{}", args.width, args.height);
        }
        let mut rng = StdRng::seed_from_u64(args.seed);
        let grid = random_grid(&mut rng, args.dim)?;
        let images = ImageBatch::try_from_fn(args.batch, args.width, args.height, |_, _, _| {
            [rng.random(), rng.random(), rng.random()]
        })
        .with_context(|| {
            format!("Invalid batch size: {} x {}x{}", args.batch, args.width, args.height)
        })?;
        Ok(Self { rng, grid, images })
    }

    /// A gradient shaped like the batch with values in `[-1, 1)`.
    pub fn gradient(&mut self) -> ImageBatch {
        let shape = self.images.shape();
        let mut grad = ImageBatch::zeros(shape);
        for v in grad.data_mut() {
            *v = self.rng.random_range(-1.0..1.0);
        }
        grad
    }
}

/// Grid with uniform random vertex values
pub fn random_grid(rng: &mut StdRng, dim: usize) -> Result<Grid> {
    Grid::from_fn(dim, |_, _, _| [rng.random(), rng.random(), rng.random()])
        .with_context(|| format!("Invalid grid dimension: {dim}"))
}

/// Byte count in binary units, two decimals above 1 KB.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use difflut_lut::Interpolation;
    use difflut_ops::{InputGradient, ScatterStrategy};
    use std::io::Write;

    #[test]
    fn test_config_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interpolation: tetrahedral").unwrap();
        writeln!(file, "scatter: atomic").unwrap();
        writeln!(file, "min_parallel_pixels: 16").unwrap();

        let args = KernelArgs {
            config: Some(file.path().to_path_buf()),
            strategy: Some(ScatterStrategy::Serial),
            ..Default::default()
        };
        let config = kernel_config(&args).unwrap();
        assert_eq!(config.interpolation, Interpolation::Tetrahedral);
        assert_eq!(config.scatter, ScatterStrategy::Serial);
        assert_eq!(config.input_gradient, InputGradient::PassThrough);
        assert_eq!(config.min_parallel_pixels, 16);
    }

    #[test]
    fn test_bad_config_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scatter: sideways").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config"));
    }

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_random_data_is_seeded() {
        let args = DataArgs {
            dim: 5,
            batch: 2,
            width: 3,
            height: 3,
            seed: 42,
        };
        let a = RandomData::new(&args).unwrap();
        let b = RandomData::new(&args).unwrap();
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.images, b.images);
        assert!(a.images.data().iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_overflowing_batch_is_an_error() {
        let args = DataArgs {
            dim: 2,
            batch: usize::MAX,
            width: 2,
            height: 2,
            seed: 0,
        };
        let err = RandomData::new(&args).err().unwrap();
        assert!(format!("{err}").contains("Invalid batch size"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 << 40), "5120.00 GB");
    }
}
