//! Exact top-N ground truth for a query set over a corpus.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use annbench::cli;
use annbench::groundtruth::{self, GroundTruthConfig, DEFAULT_WINDOW_FACTOR};
use annbench::Metric;

#[derive(Parser, Debug)]
#[command(
    name = "annbench-groundtruth",
    version,
    about = "Compute exact top-N neighbors of every query in <query> over <base> and save them to <gt>",
    long_about = "Compute exact top-N neighbors of every query in <query> over <base> and save \
                  them to <gt>. <base> and <query> may be any of .[b/i/f]vecs(.gz); <gt> must be \
                  .ivecs(.gz). Each output record lists the N corpus indices in ascending order."
)]
struct Cli {
    /// Output ground-truth file (.ivecs or .ivecs.gz)
    gt: PathBuf,

    /// Corpus vectors
    base: PathBuf,

    /// Query vectors
    query: PathBuf,

    /// Distance metric: l1, l2 (squared Euclidean) or ip (negated inner product)
    metric: Metric,

    /// Neighbors per query
    top_n: usize,

    /// Worker threads
    #[arg(env = "ANNBENCH_THREADS")]
    threads: usize,

    /// Queries buffered per worker in one scan window
    #[arg(long, env = "ANNBENCH_WINDOW_FACTOR", default_value_t = DEFAULT_WINDOW_FACTOR)]
    window_factor: usize,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = GroundTruthConfig {
        workers: cli.threads,
        window_factor: cli.window_factor,
    };
    let stats = groundtruth::generate_files(
        &cli.gt,
        &cli.base,
        &cli.query,
        cli.metric,
        cli.top_n,
        &config,
    )
    .with_context(|| format!("generating ground truth into '{}'", cli.gt.display()))?;
    tracing::info!(
        corpus = stats.corpus,
        queries = stats.queries,
        windows = stats.windows,
        "ground truth written"
    );
    Ok(())
}

fn main() -> ExitCode {
    cli::init_tracing();
    match cli::parse_args::<Cli>() {
        Ok(args) => cli::finish(run(args)),
        Err(code) => code,
    }
}
