//! Dataset preparation: random vector files and random subsets.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{Error, Result};
use crate::vecs::{Element, ElementType, FileKind, VectorSink, VectorSource, Vectors};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// `n` vectors uniform in `[0, 1)^dim`.
pub fn uniform_vectors(n: usize, dim: usize, seed: u64) -> Result<Vectors<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..n * dim).map(|_| rng.random::<f32>()).collect();
    Vectors::from_flat(dim, data)
}

/// Value range for [`write_random`], resolved against the file's element type.
#[derive(Debug, Clone, Copy)]
enum ValueRange {
    Int(i64, i64),
    Real(f64, f64),
}

impl ValueRange {
    fn resolve(element: ElementType, min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::Config(format!("range [{min}, {max}] is not finite")));
        }
        let range = match element {
            ElementType::U8 => ValueRange::Int(u8::from_f64(min) as i64, u8::from_f64(max) as i64),
            ElementType::I32 => ValueRange::Int(i32::from_f64(min) as i64, i32::from_f64(max) as i64),
            ElementType::F32 => ValueRange::Real(f32::from_f64(min) as f64, f32::from_f64(max) as f64),
        };
        let empty = match range {
            ValueRange::Int(lo, hi) => lo > hi,
            ValueRange::Real(lo, hi) => lo > hi,
        };
        if empty {
            return Err(Error::Config(format!("<min = {min}> exceeds <max = {max}>")));
        }
        Ok(range)
    }

    fn sample(self, rng: &mut StdRng) -> f64 {
        match self {
            ValueRange::Int(lo, hi) => rng.random_range(lo..=hi) as f64,
            ValueRange::Real(lo, hi) => rng.random_range(lo..=hi),
        }
    }
}

/// Write `count` random `dim`-dimensional vectors to `path`.
///
/// Elements are uniform in `[min, max]`, in the element type named by the
/// extension (integers for `.bvecs` / `.ivecs`). `seed = None` seeds from the
/// OS.
pub fn write_random(
    path: &Path,
    dim: usize,
    count: usize,
    min: f64,
    max: f64,
    seed: Option<u64>,
) -> Result<()> {
    if dim == 0 {
        return Err(Error::Config("<dim = 0> is invalid".into()));
    }
    let range = ValueRange::resolve(FileKind::from_path(path)?.element, min, max)?;
    let mut sink = VectorSink::create(path)?;
    let mut rng = rng_from(seed);
    let mut row = vec![0.0; dim];
    for _ in 0..count {
        for v in row.iter_mut() {
            *v = range.sample(&mut rng);
        }
        sink.write_f64(&row)?;
    }
    sink.finish()?;
    info!(path = %path.display(), dim, count, "random dataset written");
    Ok(())
}

/// Pick `count` ascending, distinct indices from `[0, total)`, one uniformly
/// from each of `count` equal-width strata.
pub fn stratified_sample(rng: &mut impl Rng, total: usize, count: usize) -> Result<Vec<usize>> {
    if count > total {
        return Err(Error::Logic(format!(
            "argument <count = {count}> is larger than vector count {total}"
        )));
    }
    let bound = |i: usize| (total as u128 * i as u128 / count as u128) as usize;
    Ok((0..count)
        .map(|i| rng.random_range(bound(i)..bound(i + 1)))
        .collect())
}

/// Copy `count` randomly chosen records of `src` into `dst`, converting the
/// element type when the extensions differ. Returns the record count of `src`.
pub fn extract_subset(src: &Path, dst: &Path, count: usize, seed: Option<u64>) -> Result<usize> {
    let mut row = Vec::new();
    let mut source = VectorSource::open(src)?;
    while source.read_f64(&mut row)?.is_some() {
        row.clear();
    }
    let total = source.records();

    let picks = stratified_sample(&mut rng_from(seed), total, count)?;
    let mut source = VectorSource::open(src)?;
    let mut sink = VectorSink::create(dst)?;
    let mut cursor = 0;
    for pick in picks {
        loop {
            row.clear();
            source.read_f64(&mut row)?.ok_or_else(|| {
                Error::Format(format!("'{}' changed while being read", src.display()))
            })?;
            cursor += 1;
            if cursor > pick {
                break;
            }
        }
        sink.write_f64(&row)?;
    }
    sink.finish()?;
    info!(
        src = %src.display(),
        dst = %dst.display(),
        total,
        count,
        "subset extracted"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_vectors_are_reproducible() {
        let a = uniform_vectors(10, 4, 42).unwrap();
        assert_eq!((a.len(), a.dim()), (10, 4));
        assert_eq!(a, uniform_vectors(10, 4, 42).unwrap());
        assert!(a.as_flat().iter().all(|&v| (0.0..1.0).contains(&v)));
        assert!(uniform_vectors(10, 0, 42).is_err());
    }

    #[test]
    fn stratified_picks_one_per_stratum() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks = stratified_sample(&mut rng, 100, 10).unwrap();
        assert_eq!(picks.len(), 10);
        for (i, &p) in picks.iter().enumerate() {
            assert!((i * 10..(i + 1) * 10).contains(&p), "{p} outside stratum {i}");
        }
        assert_eq!(stratified_sample(&mut rng, 5, 5).unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(stratified_sample(&mut rng, 5, 0).unwrap().is_empty());
        assert!(matches!(stratified_sample(&mut rng, 3, 4), Err(Error::Logic(_))));
    }

    #[test]
    fn random_bytes_stay_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.bvecs");
        write_random(&path, 4, 50, 10.0, 20.0, Some(1)).unwrap();
        let set = Vectors::<u8>::load(&path).unwrap();
        assert_eq!((set.len(), set.dim()), (50, 4));
        assert!(set.as_flat().iter().all(|&v| (10..=20).contains(&v)));
    }

    #[test]
    fn random_floats_are_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.fvecs");
        let b = dir.path().join("b.fvecs.gz");
        write_random(&a, 3, 20, -1.0, 1.0, Some(9)).unwrap();
        write_random(&b, 3, 20, -1.0, 1.0, Some(9)).unwrap();
        let a = Vectors::<f32>::load(&a).unwrap();
        assert_eq!(a, Vectors::<f32>::load(&b).unwrap());
        assert!(a.as_flat().iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn random_rejects_bad_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.ivecs");
        assert!(write_random(&path, 2, 1, 5.0, 1.0, None).is_err());
        assert!(write_random(&path, 0, 1, 0.0, 1.0, None).is_err());
        assert!(write_random(&path, 2, 1, f64::NAN, 1.0, None).is_err());
    }

    #[test]
    fn subset_converts_and_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("base.ivecs");
        let rows: Vec<Vec<i32>> = (0..30).map(|i| vec![i, i * 2]).collect();
        Vectors::from_rows(&rows).unwrap().save(&src).unwrap();

        let dst = dir.path().join("sub.fvecs");
        assert_eq!(extract_subset(&src, &dst, 6, Some(3)).unwrap(), 30);
        let sub = Vectors::<f32>::load(&dst).unwrap();
        assert_eq!(sub.len(), 6);
        let mut last = -1.0;
        for row in sub.rows() {
            assert_eq!(row[1], row[0] * 2.0);
            assert!(row[0] > last);
            last = row[0];
        }

        assert!(matches!(
            extract_subset(&src, &dst, 31, Some(3)),
            Err(Error::Logic(_))
        ));
    }
}
