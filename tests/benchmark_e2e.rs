//! End-to-end runs: vector files on disk, exact ground truth, flat index,
//! benchmark cases, text reports.

use std::path::Path;

use annbench::benchmark::{parse_cases, parse_percentages, Benchmark, TestCase, TopK};
use annbench::dataset::uniform_vectors;
use annbench::groundtruth::{generate_files, GroundTruthConfig};
use annbench::{Error, FlatIndex, Metric, SearchIndex};

/// Writes base, queries and ground truth; returns their paths.
fn prepare(dir: &Path, top_n: usize) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
    let base = dir.join("base.fvecs");
    let query = dir.join("query.fvecs");
    let gt = dir.join("gt.ivecs");
    uniform_vectors(500, 6, 3).unwrap().save(&base).unwrap();
    uniform_vectors(37, 6, 4).unwrap().save(&query).unwrap();
    let config = GroundTruthConfig {
        workers: 4,
        window_factor: 5,
    };
    generate_files(&gt, &base, &query, Metric::SquaredL2, top_n, &config).unwrap();
    (base, query, gt)
}

fn recall_line(report: &str) -> &str {
    report.lines().find(|l| l.starts_with("recall:")).unwrap()
}

#[test]
fn exact_index_scores_full_recall() {
    let dir = tempfile::tempdir().unwrap();
    let (base, query, gt) = prepare(dir.path(), 10);

    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let top_k = TopK::parse("10").unwrap();
    let mut bench = Benchmark::load(index, &query, &gt, top_k).unwrap();

    let case = TestCase::parse("/2x1x1").unwrap();
    let mut report = bench.run(&case).unwrap();
    assert_eq!(report.latency.len(), 74);
    assert_eq!(report.recall.len(), 37);
    let text = report.render(&parse_percentages("50,99").unwrap()).unwrap();
    assert_eq!(
        recall_line(&text),
        "recall: best=1 worst=1 average=1 P(50%)=1 P(99%)=1"
    );
}

#[test]
fn many_cases_with_wrapping_batches() {
    let dir = tempfile::tempdir().unwrap();
    let (base, query, gt) = prepare(dir.path(), 5);

    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let mut bench = Benchmark::load(index, &query, &gt, TopK::new(5, 20).unwrap()).unwrap();
    let cases = parse_cases("/3x8x4;metric=l2/1x37x2;/5x7x3").unwrap();
    let percentages = parse_percentages("0,50,99.9,100").unwrap();

    let mut out = Vec::new();
    bench.run_all(&cases, &percentages, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let reports: Vec<&str> = text.split("qps: ").skip(1).collect();
    assert_eq!(reports.len(), 3);
    for report in reports {
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("cpu-util: "));
        assert_eq!(lines[2], "mem-r-bw: NaN");
        assert_eq!(lines[3], "mem-w-bw: NaN");
        assert!(lines[4].starts_with("latency: best="));
        assert!(lines[4].ends_with(&*format!("P(100%)={}", worst_of(lines[4]))));
        assert!(lines[5].starts_with("recall: best=1 worst=1 "));
        assert!(lines[5].contains(" P(99.9%)=1 "));
    }
}

fn worst_of(latency_line: &str) -> &str {
    latency_line
        .split_whitespace()
        .find_map(|f| f.strip_prefix("worst="))
        .unwrap()
}

#[test]
fn wrong_metric_lowers_recall() {
    let dir = tempfile::tempdir().unwrap();
    let (base, query, gt) = prepare(dir.path(), 10);

    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let mut bench = Benchmark::load(index, &query, &gt, TopK::parse("10").unwrap()).unwrap();
    let mut report = bench.run(&TestCase::parse("metric=ip/1x4x2").unwrap()).unwrap();
    assert!(report.recall.average() < 1.0);
    assert!(report.recall.worst().unwrap() < 1.0);
}

#[test]
fn loading_rejects_inconsistent_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let (base, query, gt) = prepare(dir.path(), 5);

    // Ground truth narrower than k1.
    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let err = Benchmark::load(index, &query, &gt, TopK::parse("6").unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Format(_)));

    // Queries of another dimension.
    let other = dir.path().join("other.fvecs");
    uniform_vectors(3, 7, 9).unwrap().save(&other).unwrap();
    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let err = Benchmark::load(index, &other, &gt, TopK::parse("5").unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, Error::DimensionMismatch { expected: 6, actual: 7 }));

    // Ground truth stored in the wrong format.
    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    assert!(Benchmark::load(index, &query, &base, TopK::parse("5").unwrap()).is_err());
}

#[test]
fn cpu_list_must_match_thread_count() {
    let err = parse_cases("/1x1x2:0").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[cfg(target_os = "linux")]
#[test]
fn pinned_workers_run() {
    let dir = tempfile::tempdir().unwrap();
    let (base, query, gt) = prepare(dir.path(), 5);
    let index = FlatIndex::load(&base, Metric::SquaredL2).unwrap();
    let mut bench = Benchmark::load(index, &query, &gt, TopK::parse("5").unwrap()).unwrap();
    assert_eq!(bench.index().dimension(), 6);

    let cpu = first_allowed_cpu();
    let case = TestCase::parse(&format!("/1x2x2:{cpu},-1")).unwrap();
    let mut report = bench.run(&case).unwrap();
    assert_eq!(report.recall.worst().unwrap(), 1.0);
    assert!(report.cpu_util.is_finite());
}

#[cfg(target_os = "linux")]
fn first_allowed_cpu() -> usize {
    // The test process may be restricted to a subset of CPUs.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set);
        (0..libc::CPU_SETSIZE as usize)
            .find(|&c| libc::CPU_ISSET(c, &set))
            .unwrap()
    }
}
