//! Row sinks

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination of output rows
pub trait RowSink: Send {
    fn write_row(&mut self, row: &[String]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Flush and release the destination
    fn close(&mut self) -> io::Result<()>;
}

/// UTF-8 CSV output, quoting fields only when needed
pub struct CsvSink<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create (or truncate) a CSV file
    pub fn create(path: &Path) -> io::Result<Self> {
        let writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_path(path)?;
        Ok(Self { writer })
    }
}

impl<W: Write + Send> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .quote_style(csv::QuoteStyle::Necessary)
                .from_writer(writer),
        }
    }
}

impl<W: Write + Send> RowSink for CsvSink<W> {
    fn write_row(&mut self, row: &[String]) -> io::Result<()> {
        self.writer.write_record(row)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// CSV file that is only created when the first row arrives
///
/// A run that fails before producing its header leaves no file behind.
pub struct CsvFileSink {
    path: PathBuf,
    sink: Option<CsvSink<File>>,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sink: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> io::Result<&mut CsvSink<File>> {
        match &mut self.sink {
            Some(sink) => Ok(sink),
            slot => Ok(slot.insert(CsvSink::create(&self.path)?)),
        }
    }
}

impl RowSink for CsvFileSink {
    fn write_row(&mut self, row: &[String]) -> io::Result<()> {
        self.open()?.write_row(row)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.open()?.close()
    }
}

/// Keeps every row in memory, for tests and previews
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    pub rows: Vec<Vec<String>>,

    /// Number of `flush` calls
    pub flushes: usize,

    pub closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for MemorySink {
    fn write_row(&mut self, row: &[String]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"));
        }
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_csv_quoting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_row(&row(&["id", "note"])).unwrap();
        sink.write_row(&row(&["1", "say \"hi\", then leave"])).unwrap();
        sink.write_row(&row(&["2", ""])).unwrap();
        sink.close().unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert_eq!(out, "id,note\n1,\"say \"\"hi\"\", then leave\"\n2,\n");
    }

    #[test]
    fn test_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_row(&row(&["a", "b"])).unwrap();
        sink.flush().unwrap();

        // flushed rows are visible before close
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
        sink.close().unwrap();
    }

    #[test]
    fn test_csv_file_created_on_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");

        let mut sink = CsvFileSink::new(&path);
        sink.flush().unwrap();
        assert!(!path.exists());

        sink.write_row(&row(&["a", "b"])).unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
        sink.close().unwrap();
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_row(&row(&["x"])).unwrap();
        sink.flush().unwrap();
        sink.close().unwrap();

        assert_eq!(sink.rows, vec![row(&["x"])]);
        assert_eq!(sink.flushes, 1);
        assert!(sink.write_row(&row(&["y"])).is_err());
    }
}
