//! Drive an index through test cases and report throughput, latency and
//! recall.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use annbench::benchmark::{parse_cases, parse_percentages, Benchmark, TopK};
use annbench::{cli, FlatIndex, Metric, SearchIndex};

#[derive(Parser, Debug)]
#[command(
    name = "annbench-bench",
    version,
    about = "Benchmark an index with the queries in <query> and score recall against <gt>",
    long_about = "Benchmark an index with the queries in <query> and score recall against <gt>.\n\n\
                  <index> is a vector file searched exactly by brute force.\n\
                  <top_k> is `k` or `k1@k2`: recall counts the first k1 ground-truth \
                  neighbors found among k2 results.\n\
                  <percentages> is a comma-separated list such as `50,99,99.9`.\n\
                  <cases> is a `;`-separated list of `[params]/<loop>x<batch>x<threads>[:<cpu,...>]`, \
                  e.g. `metric=l2/4x1x8:0,1,2,3,4,5,6,7`."
)]
struct Cli {
    /// Index file
    index: PathBuf,

    /// Query vectors
    query: PathBuf,

    /// Ground truth (.ivecs or .ivecs.gz)
    gt: PathBuf,

    /// Neighbors: `k` or `k1@k2`
    top_k: TopK,

    /// Percentiles to report, comma-separated
    percentages: String,

    /// Test cases, `;`-separated
    cases: String,

    /// Metric of the flat index until a case overrides it
    #[arg(long, env = "ANNBENCH_METRIC", default_value = "l2")]
    metric: Metric,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let percentages = parse_percentages(&cli.percentages)?;
    let cases = parse_cases(&cli.cases)?;

    let index = FlatIndex::load(&cli.index, cli.metric)
        .with_context(|| format!("loading index '{}'", cli.index.display()))?;
    tracing::info!(
        vectors = index.num_vectors(),
        dim = index.dimension(),
        "index loaded"
    );
    let mut bench = Benchmark::load(index, &cli.query, &cli.gt, cli.top_k)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    bench.run_all(&cases, &percentages, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    cli::init_tracing();
    match cli::parse_args::<Cli>() {
        Ok(args) => cli::finish(run(args)),
        Err(code) => code,
    }
}
