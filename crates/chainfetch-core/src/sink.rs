//! Output sinks for fetched records.
//!
//! Records are written as they arrive, one slice at a time, and each slice
//! is flushed before the next is fetched. A job that fails half-way leaves
//! everything fetched so far on disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::FetchError;
use crate::job::FetchJob;
use crate::types::LogRecord;

/// Destination for one job's records.
pub trait EventSink: Send {
    /// Append one record.
    fn write(&mut self, record: &LogRecord) -> Result<(), FetchError>;

    /// Push buffered records to the underlying storage.
    fn flush(&mut self) -> Result<(), FetchError>;

    /// Flush and release the sink. Called once, after the last record.
    fn finish(&mut self) -> Result<(), FetchError> {
        self.flush()
    }
}

/// Creates one sink per job in bulk mode.
pub trait SinkFactory: Send + Sync {
    fn create(&self, job: &FetchJob) -> Result<Box<dyn EventSink>, FetchError>;
}

// ─── JSON lines ───────────────────────────────────────────────────────────────

enum Encoder<W: Write> {
    Plain(BufWriter<W>),
    Gzip(GzEncoder<BufWriter<W>>),
}

/// Writes one JSON object per line, optionally gzip-compressed.
pub struct JsonlSink<W: Write + Send> {
    out: Option<Encoder<W>>,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: Some(Encoder::Plain(BufWriter::new(writer))),
        }
    }

    pub fn gzip(writer: W) -> Self {
        Self {
            out: Some(Encoder::Gzip(GzEncoder::new(
                BufWriter::new(writer),
                Compression::default(),
            ))),
        }
    }

    fn writer(&mut self) -> io::Result<&mut dyn Write> {
        match self.out.as_mut() {
            Some(Encoder::Plain(w)) => Ok(w),
            Some(Encoder::Gzip(w)) => Ok(w),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink already finished")),
        }
    }
}

impl JsonlSink<File> {
    /// Create `path`, gzip-compressed if it ends in `.gz`. Missing parent
    /// directories are created.
    pub fn create(path: &Path) -> Result<Self, FetchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FetchError::config(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(path)
            .map_err(|e| FetchError::config(format!("cannot create {}: {e}", path.display())))?;
        let gz = path.extension().is_some_and(|ext| ext == "gz");
        Ok(if gz { Self::gzip(file) } else { Self::new(file) })
    }
}

impl<W: Write + Send> EventSink for JsonlSink<W> {
    fn write(&mut self, record: &LogRecord) -> Result<(), FetchError> {
        let line = serde_json::to_vec(record).map_err(io::Error::from)?;
        let w = self.writer()?;
        w.write_all(&line)?;
        w.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FetchError> {
        match self.out.as_mut() {
            // Sync-flush the deflate stream so a partial file stays readable.
            Some(Encoder::Gzip(w)) => w.flush()?,
            Some(Encoder::Plain(w)) => w.flush()?,
            None => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        match self.out.take() {
            Some(Encoder::Gzip(w)) => w.finish()?.flush()?,
            Some(Encoder::Plain(mut w)) => w.flush()?,
            None => {}
        }
        Ok(())
    }
}

/// Output file layout for bulk runs: `<dir>/<display name><extension>`.
#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    dir: PathBuf,
    extension: String,
}

impl FileSinkFactory {
    /// Gzip-compressed JSON lines (`.jsonl.gz`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: ".jsonl.gz".into(),
        }
    }

    /// Uncompressed JSON lines (`.jsonl`).
    pub fn plain(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: ".jsonl".into(),
        }
    }

    /// The job's output file. Names that are empty, `.`/`..` or contain a
    /// path separator are rejected so every file lands directly in `dir`.
    pub fn path_for(&self, job: &FetchJob) -> Result<PathBuf, FetchError> {
        let name = job.display_name();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(FetchError::config(format!(
                "job name {name:?} cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{name}{}", self.extension)))
    }
}

impl SinkFactory for FileSinkFactory {
    fn create(&self, job: &FetchJob) -> Result<Box<dyn EventSink>, FetchError> {
        let path = self.path_for(job)?;
        tracing::debug!(path = %path.display(), job = %job.display_name(), "opening output");
        Ok(Box::new(JsonlSink::create(&path)?))
    }
}

// ─── Memory ───────────────────────────────────────────────────────────────────

/// Collects records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    flushes: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `flush` calls seen.
    pub fn flushes(&self) -> usize {
        self.flushes.lock().map(|f| *f).unwrap_or(0)
    }
}

impl EventSink for MemorySink {
    fn write(&mut self, record: &LogRecord) -> Result<(), FetchError> {
        self.records
            .lock()
            .map_err(|_| FetchError::Sink(io::Error::other("memory sink poisoned")))?
            .push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FetchError> {
        if let Ok(mut f) = self.flushes.lock() {
            *f += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::testing::log_at;

    const ADDR: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn jsonl_sink_writes_one_line_per_record() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonlSink::new(&mut buf);
            sink.write(&LogRecord::Raw(log_at(ADDR, 1, 0))).unwrap();
            sink.write(&LogRecord::Raw(log_at(ADDR, 2, 0))).unwrap();
            sink.finish().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["blockNumber"], 1);
    }

    #[test]
    fn gz_path_is_compressed_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.jsonl.gz");
        let mut sink = JsonlSink::create(&path).unwrap();
        sink.write(&LogRecord::Raw(log_at(ADDR, 7, 1))).unwrap();
        sink.finish().unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains(r#""blockNumber":7"#));
    }

    #[test]
    fn write_after_finish_fails() {
        let mut sink = JsonlSink::new(Vec::new());
        sink.finish().unwrap();
        assert!(sink.write(&LogRecord::Raw(log_at(ADDR, 1, 0))).is_err());
    }

    #[test]
    fn factory_names_files_after_display_name() {
        let job = FetchJob::new(ADDR, serde_json::json!([]), 0)
            .unwrap()
            .with_name("USDC");
        let factory = FileSinkFactory::new("/tmp/out");
        assert_eq!(factory.path_for(&job).unwrap(), PathBuf::from("/tmp/out/USDC.jsonl.gz"));
        assert_eq!(
            FileSinkFactory::plain("out").path_for(&job).unwrap(),
            PathBuf::from("out/USDC.jsonl")
        );
    }

    #[test]
    fn factory_refuses_names_outside_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSinkFactory::new(dir.path().join("out"));
        for name in ["../x", "a/b", "a\\b", "..", "."] {
            let job = FetchJob::new(ADDR, serde_json::json!([]), 0)
                .unwrap()
                .with_name(name);
            assert!(factory.create(&job).is_err_and(|e| e.is_configuration()), "{name}");
        }
        assert!(!dir.path().join("x.jsonl.gz").exists());
        assert!(!dir.path().join("out").exists());
    }
}
