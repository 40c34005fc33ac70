//! File sink for the inconsistency narratives.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use kvoracle_core::{InconsistencySink, ReadInconsistency};

/// Writes every reported inconsistency to a file, one rendered block each.
///
/// The file is created (or truncated) by the first inconsistency. A run
/// without inconsistencies leaves any existing file untouched.
#[derive(Debug)]
pub struct InconsistencyLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl InconsistencyLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            written: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of inconsistencies written so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered output to disk.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.writer.is_none() {
            tracing::debug!(path = %self.path.display(), "opening inconsistency report");
            self.writer = Some(BufWriter::new(File::create(&self.path)?));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("inconsistency report is not open"))
    }
}

impl InconsistencySink for InconsistencyLog {
    type Error = io::Error;

    fn record(&mut self, inconsistency: ReadInconsistency) -> Result<(), Self::Error> {
        writeln!(self.writer()?, "{inconsistency}")?;
        self.written += 1;
        Ok(())
    }
}
