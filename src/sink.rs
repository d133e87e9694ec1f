//! Error side files.
//!
//! An [`ErrorSink`] appends the raw representation of every skipped item to
//! a plain text file, one failure per line. Backslashes and line breaks in
//! the raw input are escaped (`\\`, `\n`, `\r`), so a multi-line fragment
//! stays on one line and its exact bytes can be restored. The file is
//! opened on the first skip (append mode, created if absent) and released
//! when the sink is dropped at the end of the step.
//!
//! Failures of the sink itself are swallowed: they are counted and logged,
//! never propagated into the step.

use crate::error::BatchError;
use crate::payment::Payment;
use crate::report::ReportLine;
use crate::skip::SkipListener;
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Text recorded for an item that was skipped without a raw input of its own.
pub trait RawItem {
    fn raw(&self) -> String;
}

impl RawItem for Payment {
    fn raw(&self) -> String {
        self.to_json_line()
    }
}

impl RawItem for ReportLine {
    fn raw(&self) -> String {
        self.raw_line()
    }
}

pub struct ErrorSink {
    path: PathBuf,
    file: Option<File>,
    recorded: usize,
    dropped: usize,
}

impl ErrorSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            recorded: 0,
            dropped: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended so far.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Lines lost because the side file could not be written.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Append `raw_input` as one line. Never fails.
    pub fn record(&mut self, raw_input: &str, cause: &BatchError) {
        match self.append(raw_input) {
            Ok(()) => self.recorded += 1,
            Err(e) => {
                self.dropped += 1;
                let e = BatchError::Sink(e);
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    cause = %cause,
                    "skip not recorded"
                );
            }
        }
    }

    fn append(&mut self, raw_input: &str) -> io::Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_append(&self.path)?,
        };
        let file = self.file.insert(file);
        writeln!(file, "{}", escape_line(raw_input))?;
        file.flush()
    }
}

fn escape_line(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['\\', '\r', '\n']) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl<I: RawItem, O: RawItem> SkipListener<I, O> for ErrorSink {
    fn on_skip_in_read(&mut self, error: &BatchError) {
        match error.raw_input() {
            Some(raw) => self.record(raw, error),
            None => self.record(&error.to_string(), error),
        }
    }

    fn on_skip_in_process(&mut self, item: &I, error: &BatchError) {
        self.record(&item.raw(), error);
    }

    fn on_skip_in_write(&mut self, item: &O, error: &BatchError) {
        match error.raw_input() {
            Some(raw) => self.record(raw, error),
            None => self.record(&item.raw(), error),
        }
    }
}
