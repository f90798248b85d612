//! Copy a random subset of a vector file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use annbench::{cli, dataset};

#[derive(Parser, Debug)]
#[command(
    name = "annbench-subset",
    version,
    about = "Extract <n> randomly chosen vectors from <src> into <dst>",
    long_about = "Extract <n> randomly chosen vectors from <src> into <dst>, keeping their \
                  relative order. <src> and <dst> may be any combination of .[b/i/f]vecs(.gz); \
                  elements are converted when the types differ."
)]
struct Cli {
    /// Source file
    src: PathBuf,

    /// Output file
    dst: PathBuf,

    /// Number of vectors to keep
    n: usize,

    /// Random seed; omit for a fresh seed per run
    #[arg(long, env = "ANNBENCH_SEED")]
    seed: Option<u64>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let total = dataset::extract_subset(&cli.src, &cli.dst, cli.n, cli.seed)
        .with_context(|| format!("extracting from '{}'", cli.src.display()))?;
    tracing::info!(total, kept = cli.n, "subset written");
    Ok(())
}

fn main() -> ExitCode {
    cli::init_tracing();
    match cli::parse_args::<Cli>() {
        Ok(args) => cli::finish(run(args)),
        Err(code) => code,
    }
}
