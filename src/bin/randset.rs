//! Write a random vector file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use annbench::{cli, dataset};

#[derive(Parser, Debug)]
#[command(
    name = "annbench-randset",
    version,
    about = "Generate <n> random <dim>-dimensional vectors with elements in [min, max] and save them to <dst>",
    long_about = "Generate <n> random <dim>-dimensional vectors with elements in [min, max] and \
                  save them to <dst>. The element type follows the extension of <dst>: u8 for \
                  .bvecs, i32 for .ivecs, f32 for .fvecs, each optionally .gz."
)]
struct Cli {
    /// Output file
    dst: PathBuf,

    /// Vector dimension
    dim: usize,

    /// Number of vectors
    n: usize,

    /// Smallest element value
    #[arg(allow_negative_numbers = true)]
    min: f64,

    /// Largest element value
    #[arg(allow_negative_numbers = true)]
    max: f64,

    /// Random seed; omit for a fresh seed per run
    #[arg(long, env = "ANNBENCH_SEED")]
    seed: Option<u64>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    dataset::write_random(&cli.dst, cli.dim, cli.n, cli.min, cli.max, cli.seed)
        .with_context(|| format!("writing '{}'", cli.dst.display()))
}

fn main() -> ExitCode {
    cli::init_tracing();
    match cli::parse_args::<Cli>() {
        Ok(args) => cli::finish(run(args)),
        Err(code) => code,
    }
}
