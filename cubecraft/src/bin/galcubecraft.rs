//! Generate batches of synthetic galaxy cubes and write them to disk
//!
//! Every cube is saved as `.npy` with a `.json` metadata sidecar in the
//! output directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cubecraft::io::CubeWriter;
use cubecraft::shared_args::GeneratorArgs;
use cubecraft::{CubeAssembler, ResponseCache};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

/// Command line arguments for cube generation
#[derive(Parser, Debug)]
#[command(
    name = "galcubecraft",
    about = "Generates synthetic IFU spectral cubes of rotating disk galaxies",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    generator: GeneratorArgs,

    /// Directory the cubes and metadata are written to
    #[arg(long, default_value = "cubes")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.generator.to_config();

    let default_level = if config.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let cache = ResponseCache::new();
    let assembler =
        CubeAssembler::new(&config, &cache).context("Invalid generator configuration")?;
    let writer = CubeWriter::new(&args.output_dir).with_fname(config.fname.clone());

    info!(
        "Generating {} cubes of shape {} (base seed {}) into {}",
        config.n_cubes,
        config.shape(),
        assembler.base_seed(),
        args.output_dir.display()
    );

    let pb = if config.verbose {
        let pb = ProgressBar::new(config.n_cubes as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .context("Invalid progress bar template")?
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        pb.set_message("Generating cubes");
        pb
    } else {
        ProgressBar::hidden()
    };

    let failures: usize = (0..config.n_cubes)
        .into_par_iter()
        .map(|index| {
            let outcome = assembler
                .assemble(index)
                .map_err(anyhow::Error::from)
                .and_then(|generated| writer.save(&generated).map_err(anyhow::Error::from));
            pb.inc(1);
            match outcome {
                Ok(path) => {
                    info!("Wrote {}", path.display());
                    0
                }
                Err(err) => {
                    warn!("Cube {} failed: {:#}", index, err);
                    1
                }
            }
        })
        .sum();

    pb.finish_with_message("Generation complete");

    if failures > 0 {
        bail!("{} of {} cubes failed", failures, config.n_cubes);
    }
    Ok(())
}
