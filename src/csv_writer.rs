use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::error;

const DEFAULT_BUFFER_BYTES: usize = 256 * 1024;

/// Concurrency-safe buffered CSV writer for high-throughput sensor logging.
///
/// Rows are encoded into the csv crate's in-memory buffer; the mutex is held
/// only for a single row encode or a single flush, so the hot path never
/// blocks on I/O. Flushing is driven externally by the recording controller.
pub struct CsvWriter {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    // None once closed; late writes are ignored.
    wtr: Option<csv::Writer<File>>,
    rows: u64,
}

impl CsvWriter {
    /// Creates (truncating) the file and writes the header row if requested.
    pub fn new(
        path: impl Into<PathBuf>,
        buf_size_bytes: usize,
        write_header: bool,
        header: &[&str],
    ) -> Result<Self> {
        let path = path.into();
        let file =
            File::create(&path).with_context(|| format!("csv create {}", path.display()))?;

        let capacity = if buf_size_bytes == 0 {
            DEFAULT_BUFFER_BYTES
        } else {
            buf_size_bytes
        };
        let mut wtr = csv::WriterBuilder::new()
            .buffer_capacity(capacity)
            .from_writer(file);

        if write_header && !header.is_empty() {
            wtr.write_record(header)
                .with_context(|| format!("csv write header {}", path.display()))?;
        }

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                wtr: Some(wtr),
                rows: 0,
            }),
        })
    }

    /// Appends a single row. Encode errors are buffered and surface on flush.
    pub fn write_row(&self, row: &[String]) {
        let mut inner = self.inner.lock();
        if let Some(wtr) = inner.wtr.as_mut() {
            let _ = wtr.write_record(row);
            inner.rows += 1;
        }
    }

    /// Pushes buffered data to the OS. Errors are logged, not propagated.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        if let Some(wtr) = inner.wtr.as_mut() {
            if let Err(e) = wtr.flush() {
                error!("csv flush {}: {e}", self.path.display());
            }
        }
    }

    /// Flushes remaining data and closes the file. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(mut wtr) = inner.wtr.take() {
            if let Err(e) = wtr.flush() {
                error!("csv close {}: {e}", self.path.display());
            }
        }
    }

    /// Number of data rows written (excludes the header).
    pub fn rows(&self) -> u64 {
        self.inner.lock().rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &[&str] = &["a", "b", "c"];

    #[test]
    fn test_header_written_exactly() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 0, true, HEADER)?;
        w.flush();

        let contents = fs::read_to_string(&path)?;
        assert_eq!(contents, "a,b,c\n");
        assert_eq!(w.rows(), 0);
        Ok(())
    }

    #[test]
    fn test_rows_counted_and_flushed() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 0, true, HEADER)?;
        w.write_row(&["1".into(), "2".into(), "3".into()]);
        w.write_row(&["4".into(), "5".into(), "6".into()]);
        assert_eq!(w.rows(), 2);

        w.flush();
        let contents = fs::read_to_string(&path)?;
        assert_eq!(contents, "a,b,c\n1,2,3\n4,5,6\n");
        assert!(contents.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn test_flush_is_idempotent() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 0, true, HEADER)?;
        w.write_row(&["1".into(), "2".into(), "3".into()]);

        w.flush();
        let first = fs::read(&path)?;
        w.flush();
        let second = fs::read(&path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 0, false, &[])?;
        w.write_row(&["plain".into(), "has,comma".into(), "has\"quote".into()]);
        w.flush();

        let contents = fs::read_to_string(&path)?;
        assert_eq!(contents, "plain,\"has,comma\",\"has\"\"quote\"\n");
        Ok(())
    }

    #[test]
    fn test_no_header_when_disabled() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 4096, false, HEADER)?;
        w.flush();
        assert_eq!(fs::read_to_string(&path)?, "");
        Ok(())
    }

    #[test]
    fn test_write_after_close_is_ignored() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.csv");
        let w = CsvWriter::new(&path, 0, true, HEADER)?;
        w.write_row(&["1".into(), "2".into(), "3".into()]);
        w.close();
        w.write_row(&["9".into(), "9".into(), "9".into()]);
        w.close();

        assert_eq!(w.rows(), 1);
        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n1,2,3\n");
        Ok(())
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let res = CsvWriter::new("/nonexistent-dir-for-test/out.csv", 0, true, HEADER);
        assert!(res.is_err());
    }
}
