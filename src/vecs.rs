//! Reader and writer for the `.bvecs` / `.ivecs` / `.fvecs` vector formats.
//!
//! Format (little-endian), repeated until end of file:
//! - Dimension `D` (4 bytes, `u32`)
//! - `D` elements of the file's element type:
//!   - `.bvecs`: `u8`
//!   - `.ivecs`: `i32`
//!   - `.fvecs`: `f32`
//!
//! Any of these may carry a trailing `.gz`, in which case the stream is
//! gzip-compressed. The element type is chosen once, from the extension, when
//! the file is opened.
//!
//! End of file exactly at a record boundary ends the stream. End of file
//! anywhere inside a record is a [`Error::Format`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Element type of a vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// `.bvecs`
    U8,
    /// `.ivecs`
    I32,
    /// `.fvecs`
    F32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::I32 | ElementType::F32 => 4,
        }
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ElementType::U8 => "bvecs",
            ElementType::I32 => "ivecs",
            ElementType::F32 => "fvecs",
        }
    }
}

/// Element type plus compression, derived from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    pub element: ElementType,
    pub gzip: bool,
}

impl FileKind {
    /// Classify `path` by its extension (`.fvecs`, `.ivecs.gz`, ...).
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.to_string_lossy();
        let (stem, gzip) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_ref(), false),
        };
        let element = [ElementType::U8, ElementType::I32, ElementType::F32]
            .into_iter()
            .find(|e| stem.ends_with(&format!(".{}", e.extension())))
            .ok_or_else(|| Error::Config(format!("unsupported format '{}'", name)))?;
        Ok(Self { element, gzip })
    }
}

/// Scalar type that can be stored in a vector file.
pub trait Element: Copy + Default + PartialOrd + Send + Sync + std::fmt::Debug + 'static {
    /// Element type tag for this scalar.
    const TYPE: ElementType;

    /// Decode one element from exactly `TYPE.width()` little-endian bytes.
    fn from_le(bytes: &[u8]) -> Self;

    /// Append the little-endian encoding of `self`.
    fn put_le(self, out: &mut Vec<u8>);

    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Narrow from `f64` with Rust `as` semantics (saturating, truncating).
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $tag:expr) => {
        impl Element for $ty {
            const TYPE: ElementType = $tag;

            #[inline]
            fn from_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }

            #[inline]
            fn put_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(u8, ElementType::U8);
impl_element!(i32, ElementType::I32);
impl_element!(f32, ElementType::F32);

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn open_source(path: &Path, gzip: bool) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("cannot open file '{}': {}", path.display(), e),
        ))
    })?;
    let reader = BufReader::new(file);
    Ok(if gzip {
        Box::new(MultiGzDecoder::new(reader))
    } else {
        Box::new(reader)
    })
}

/// Streaming record reader for one element type.
pub struct VecsReader<E> {
    inner: Box<dyn Read + Send>,
    bytes: Vec<u8>,
    records: usize,
    _element: PhantomData<E>,
}

impl<E: Element> VecsReader<E> {
    /// Wrap an uncompressed byte stream.
    pub fn new(inner: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            bytes: Vec::new(),
            records: 0,
            _element: PhantomData,
        }
    }

    /// Open `path`; its extension must name element type `E`.
    pub fn open(path: &Path) -> Result<Self> {
        let kind = FileKind::from_path(path)?;
        if kind.element != E::TYPE {
            return Err(Error::Config(format!(
                "'{}' holds {:?} elements, expected {:?}",
                path.display(),
                kind.element,
                E::TYPE
            )));
        }
        Ok(Self {
            inner: open_source(path, kind.gzip)?,
            bytes: Vec::new(),
            records: 0,
            _element: PhantomData,
        })
    }

    /// Number of records read so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Append the next record to `out` and return its dimension.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn read_into(&mut self, out: &mut Vec<E>) -> Result<Option<usize>> {
        let mut header = [0u8; 4];
        let got = read_full(self.inner.as_mut(), &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got != header.len() {
            return Err(Error::Format(format!(
                "broken file: truncated header of record {}",
                self.records
            )));
        }
        let dim = u32::from_le_bytes(header) as usize;
        let width = E::TYPE.width();
        self.bytes.resize(dim * width, 0);
        let got = read_full(self.inner.as_mut(), &mut self.bytes)?;
        if got != self.bytes.len() {
            return Err(Error::Format(format!(
                "broken file: record {} declares {} dimensions but only {} bytes follow",
                self.records, dim, got
            )));
        }
        out.reserve(dim);
        out.extend(self.bytes.chunks_exact(width).map(E::from_le));
        self.records += 1;
        Ok(Some(dim))
    }

    /// Read the next record as a fresh vector.
    pub fn read(&mut self) -> Result<Option<Vec<E>>> {
        let mut out = Vec::new();
        Ok(self.read_into(&mut out)?.map(|_| out))
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// Record writer for one element type.
pub struct VecsWriter<E> {
    sink: Sink,
    bytes: Vec<u8>,
    records: usize,
    _element: PhantomData<E>,
}

impl<E: Element> VecsWriter<E> {
    /// Create (truncate) `path`; its extension must name element type `E`.
    pub fn create(path: &Path) -> Result<Self> {
        let kind = FileKind::from_path(path)?;
        if kind.element != E::TYPE {
            return Err(Error::Config(format!(
                "'{}' holds {:?} elements, cannot write {:?}",
                path.display(),
                kind.element,
                E::TYPE
            )));
        }
        let file = File::create(path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("cannot open file '{}': {}", path.display(), e),
            ))
        })?;
        let writer = BufWriter::new(file);
        let sink = if kind.gzip {
            Sink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            Sink::Plain(writer)
        };
        Ok(Self {
            sink,
            bytes: Vec::new(),
            records: 0,
            _element: PhantomData,
        })
    }

    /// Number of records written so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Append one record.
    pub fn write(&mut self, vector: &[E]) -> Result<()> {
        let dim = u32::try_from(vector.len())
            .map_err(|_| Error::Format(format!("{} dimensions exceed u32", vector.len())))?;
        self.bytes.clear();
        self.bytes.extend_from_slice(&dim.to_le_bytes());
        for &v in vector {
            v.put_le(&mut self.bytes);
        }
        match &mut self.sink {
            Sink::Plain(w) => w.write_all(&self.bytes)?,
            Sink::Gzip(w) => w.write_all(&self.bytes)?,
        }
        self.records += 1;
        Ok(())
    }

    /// Flush buffers and write the gzip trailer, if any.
    pub fn finish(self) -> Result<()> {
        match self.sink {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Gzip(w) => w.finish()?.flush()?,
        }
        Ok(())
    }
}

/// Dense row-major set of equal-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectors<E> {
    dim: usize,
    data: Vec<E>,
}

impl<E: Element> Vectors<E> {
    /// Empty set of `dim`-dimensional vectors.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Wrap flat row-major data.
    pub fn from_flat(dim: usize, data: Vec<E>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::Format(format!(
                "{} elements do not form {}-dimensional vectors",
                data.len(),
                dim
            )));
        }
        Ok(Self { dim, data })
    }

    /// Build from rows; all rows must share the first row's dimension.
    pub fn from_rows<R: AsRef<[E]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut set = Self::new(dim);
        for row in rows {
            set.push(row.as_ref())?;
        }
        Ok(set)
    }

    /// Read every record of `reader`.
    pub fn read_all(reader: &mut VecsReader<E>) -> Result<Self> {
        let mut data = Vec::new();
        let mut dim = None;
        while let Some(d) = reader.read_into(&mut data)? {
            match dim {
                None => dim = Some(d),
                Some(expected) if expected != d => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: d,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            dim: dim.unwrap_or(0),
            data,
        })
    }

    /// Load a whole file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read_all(&mut VecsReader::open(path)?)
    }

    /// Write every vector to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = VecsWriter::create(path)?;
        for row in self.rows() {
            writer.write(row)?;
        }
        writer.finish()
    }

    /// Append one vector.
    pub fn push(&mut self, row: &[E]) -> Result<()> {
        if self.data.is_empty() && self.dim == 0 {
            self.dim = row.len();
        }
        if row.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Dimension of every vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Whether the set holds no vector.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector at position `i`.
    pub fn row(&self, i: usize) -> &[E] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate vectors in order.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, E> {
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Flat row-major storage.
    pub fn as_flat(&self) -> &[E] {
        &self.data
    }

    /// Convert every element with `as` semantics.
    pub fn convert<T: Element>(&self) -> Vectors<T> {
        Vectors {
            dim: self.dim,
            data: self.data.iter().map(|&v| T::from_f64(v.to_f64())).collect(),
        }
    }
}

/// A vector set whose element type is known only at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorSet {
    U8(Vectors<u8>),
    I32(Vectors<i32>),
    F32(Vectors<f32>),
}

impl VectorSet {
    /// Load any supported vector file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(match FileKind::from_path(path)?.element {
            ElementType::U8 => VectorSet::U8(Vectors::load(path)?),
            ElementType::I32 => VectorSet::I32(Vectors::load(path)?),
            ElementType::F32 => VectorSet::F32(Vectors::load(path)?),
        })
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            VectorSet::U8(_) => ElementType::U8,
            VectorSet::I32(_) => ElementType::I32,
            VectorSet::F32(_) => ElementType::F32,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            VectorSet::U8(v) => v.dim(),
            VectorSet::I32(v) => v.dim(),
            VectorSet::F32(v) => v.dim(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorSet::U8(v) => v.len(),
            VectorSet::I32(v) => v.len(),
            VectorSet::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to `f32` rows (the search-index input type).
    pub fn to_f32(&self) -> Vectors<f32> {
        match self {
            VectorSet::U8(v) => v.convert(),
            VectorSet::I32(v) => v.convert(),
            VectorSet::F32(v) => v.clone(),
        }
    }
}

/// Streaming reader whose element type is chosen from the file name.
///
/// Records are widened to `f64` as they are read.
pub enum VectorSource {
    U8(VecsReader<u8>),
    I32(VecsReader<i32>),
    F32(VecsReader<f32>),
}

impl VectorSource {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(match FileKind::from_path(path)?.element {
            ElementType::U8 => VectorSource::U8(VecsReader::open(path)?),
            ElementType::I32 => VectorSource::I32(VecsReader::open(path)?),
            ElementType::F32 => VectorSource::F32(VecsReader::open(path)?),
        })
    }

    /// Append the next record, widened to `f64`, and return its dimension.
    pub fn read_f64(&mut self, out: &mut Vec<f64>) -> Result<Option<usize>> {
        fn widen<E: Element>(
            reader: &mut VecsReader<E>,
            out: &mut Vec<f64>,
        ) -> Result<Option<usize>> {
            let mut row = Vec::new();
            let dim = reader.read_into(&mut row)?;
            out.extend(row.into_iter().map(E::to_f64));
            Ok(dim)
        }
        match self {
            VectorSource::U8(r) => widen(r, out),
            VectorSource::I32(r) => widen(r, out),
            VectorSource::F32(r) => widen(r, out),
        }
    }

    /// Number of records read so far.
    pub fn records(&self) -> usize {
        match self {
            VectorSource::U8(r) => r.records(),
            VectorSource::I32(r) => r.records(),
            VectorSource::F32(r) => r.records(),
        }
    }
}

/// Streaming writer whose element type is chosen from the file name.
///
/// Records arrive as `f64` and are narrowed with [`Element::from_f64`].
pub enum VectorSink {
    U8(VecsWriter<u8>),
    I32(VecsWriter<i32>),
    F32(VecsWriter<f32>),
}

impl VectorSink {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(match FileKind::from_path(path)?.element {
            ElementType::U8 => VectorSink::U8(VecsWriter::create(path)?),
            ElementType::I32 => VectorSink::I32(VecsWriter::create(path)?),
            ElementType::F32 => VectorSink::F32(VecsWriter::create(path)?),
        })
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            VectorSink::U8(_) => ElementType::U8,
            VectorSink::I32(_) => ElementType::I32,
            VectorSink::F32(_) => ElementType::F32,
        }
    }

    pub fn write_f64(&mut self, vector: &[f64]) -> Result<()> {
        fn narrow<E: Element>(writer: &mut VecsWriter<E>, vector: &[f64]) -> Result<()> {
            let row: Vec<E> = vector.iter().map(|&v| E::from_f64(v)).collect();
            writer.write(&row)
        }
        match self {
            VectorSink::U8(w) => narrow(w, vector),
            VectorSink::I32(w) => narrow(w, vector),
            VectorSink::F32(w) => narrow(w, vector),
        }
    }

    pub fn records(&self) -> usize {
        match self {
            VectorSink::U8(w) => w.records(),
            VectorSink::I32(w) => w.records(),
            VectorSink::F32(w) => w.records(),
        }
    }

    pub fn finish(self) -> Result<()> {
        match self {
            VectorSink::U8(w) => w.finish(),
            VectorSink::I32(w) => w.finish(),
            VectorSink::F32(w) => w.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_f32(rows: &[&[f32]]) -> Vec<u8> {
        let mut out = Vec::new();
        for row in rows {
            out.extend_from_slice(&(row.len() as u32).to_le_bytes());
            for v in row.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn file_kind_from_extension() {
        let k = FileKind::from_path(Path::new("base.fvecs")).unwrap();
        assert_eq!(k, FileKind { element: ElementType::F32, gzip: false });
        let k = FileKind::from_path(Path::new("gt.ivecs.gz")).unwrap();
        assert_eq!(k, FileKind { element: ElementType::I32, gzip: true });
        let k = FileKind::from_path(Path::new("/data/sift.bvecs")).unwrap();
        assert_eq!(k.element, ElementType::U8);
        assert!(FileKind::from_path(Path::new("base.cvecs")).is_err());
        assert!(FileKind::from_path(Path::new("base.txt.gz")).is_err());
    }

    #[test]
    fn reads_records_until_clean_eof() {
        let bytes = encode_f32(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let mut reader: VecsReader<f32> = VecsReader::new(Cursor::new(bytes));
        assert_eq!(reader.read().unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(reader.read().unwrap(), Some(vec![3.0, 4.0]));
        assert_eq!(reader.read().unwrap(), None);
        assert_eq!(reader.records(), 2);
    }

    #[test]
    fn truncated_payload_is_format_error() {
        let mut bytes = encode_f32(&[&[1.0, 2.0]]);
        bytes.truncate(bytes.len() - 1);
        let mut reader: VecsReader<f32> = VecsReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read(), Err(Error::Format(_))));
    }

    #[test]
    fn truncated_header_is_format_error() {
        let mut reader: VecsReader<u8> = VecsReader::new(Cursor::new(vec![3u8, 0]));
        assert!(matches!(reader.read(), Err(Error::Format(_))));
    }

    #[test]
    fn mixed_dimensions_rejected() {
        let bytes = encode_f32(&[&[1.0, 2.0], &[3.0]]);
        let mut reader: VecsReader<f32> = VecsReader::new(Cursor::new(bytes));
        let err = Vectors::read_all(&mut reader).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn save_and_load_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let set = Vectors::from_rows(&[vec![1i32, -2, 3], vec![4, 5, -6]]).unwrap();
        for name in ["gt.ivecs", "gt.ivecs.gz"] {
            let path = dir.path().join(name);
            set.save(&path).unwrap();
            assert_eq!(Vectors::<i32>::load(&path).unwrap(), set);
            match VectorSet::load(&path).unwrap() {
                VectorSet::I32(v) => assert_eq!(v, set),
                other => panic!("unexpected element type {:?}", other.element_type()),
            }
        }
    }

    #[test]
    fn writer_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VecsWriter::<i32>::create(&dir.path().join("gt.fvecs")).is_err());
    }

    #[test]
    fn source_widens_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bvecs");
        Vectors::from_rows(&[vec![0u8, 255]]).unwrap().save(&path).unwrap();
        let mut source = VectorSource::open(&path).unwrap();
        let mut out = Vec::new();
        assert_eq!(source.read_f64(&mut out).unwrap(), Some(2));
        assert_eq!(out, vec![0.0, 255.0]);
        assert_eq!(source.read_f64(&mut out).unwrap(), None);
    }

    #[test]
    fn sink_narrows_to_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bvecs.gz");
        let mut sink = VectorSink::create(&path).unwrap();
        assert_eq!(sink.element_type(), ElementType::U8);
        sink.write_f64(&[1.9, 300.0, -4.0]).unwrap();
        assert_eq!(sink.records(), 1);
        sink.finish().unwrap();
        let back = Vectors::<u8>::load(&path).unwrap();
        assert_eq!(back.row(0), &[1, 255, 0]);
    }

    #[test]
    fn convert_to_f32() {
        let set = VectorSet::U8(Vectors::from_rows(&[vec![1u8, 2], vec![3, 4]]).unwrap());
        let f = set.to_f32();
        assert_eq!(f.dim(), 2);
        assert_eq!(f.row(1), &[3.0, 4.0]);
    }
}
