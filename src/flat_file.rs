//! Flat file writer with header and footer callbacks.
//!
//! The target file is truncated when the writer opens, so re-running a step
//! replaces the previous output. The footer is produced only when the writer
//! closes, after every chunk has been written.
//!
//! A chunk reaches the file whole or not at all: it is written as one block,
//! and a failed write cuts the file back to the end of the last good chunk.

use crate::error::{BatchError, Result};
use crate::item::ItemWriter;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Renders one item as one line (without terminator).
pub trait LineAggregator<T> {
    fn aggregate(&self, item: &T) -> Result<String>;
}

/// Hooks around the body of a flat file.
pub trait FlatFileCallback<T> {
    /// Line written right after the file is created. An error fails the
    /// open.
    fn header(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Observe an item once its chunk has been written.
    fn on_written(&mut self, _item: &T) {}

    /// Line written when the writer closes. An error fails the close and
    /// no footer is written.
    fn footer(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Callback that writes neither header nor footer.
pub struct NoCallback;

impl<T> FlatFileCallback<T> for NoCallback {}

pub struct FlatFileItemWriter<T, A, C> {
    path: PathBuf,
    aggregator: A,
    callback: C,
    out: Option<BufWriter<File>>,
    /// File length up to the end of the last chunk written in full.
    committed: u64,
    lines_written: usize,
    _item: PhantomData<fn(&T)>,
}

impl<T, A, C> FlatFileItemWriter<T, A, C>
where
    A: LineAggregator<T>,
    C: FlatFileCallback<T>,
{
    pub fn new(path: impl AsRef<Path>, aggregator: A, callback: C) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            aggregator,
            callback,
            out: None,
            committed: 0,
            lines_written: 0,
            _item: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Body lines written so far (header and footer excluded).
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Drop buffered bytes and cut the file back to the committed length.
    fn discard_uncommitted(&mut self) -> Result<()> {
        let Some(out) = self.out.take() else {
            return Ok(());
        };
        let (mut file, _unwritten) = out.into_parts();
        file.set_len(self.committed)?;
        file.seek(SeekFrom::Start(self.committed))?;
        self.out = Some(BufWriter::new(file));
        Ok(())
    }
}

impl<T, A, C> ItemWriter<T> for FlatFileItemWriter<T, A, C>
where
    A: LineAggregator<T>,
    C: FlatFileCallback<T>,
{
    fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let header = self.callback.header()?;
        let mut out = BufWriter::new(File::create(&self.path)?);
        self.committed = 0;
        if let Some(header) = header {
            writeln!(out, "{header}")?;
            out.flush()?;
            self.committed = header.len() as u64 + 1;
        }
        self.out = Some(out);
        self.lines_written = 0;
        Ok(())
    }

    fn write(&mut self, items: &[T]) -> Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| BatchError::Io(io::Error::other("flat file writer is not open")))?;

        // Render the whole chunk first so a bad item leaves the file untouched.
        let lines = items
            .iter()
            .map(|item| self.aggregator.aggregate(item))
            .collect::<Result<Vec<_>>>()?;

        let block: String = lines.iter().flat_map(|l| [l.as_str(), "\n"]).collect();
        let mut written = out.write_all(block.as_bytes());
        if written.is_ok() {
            written = out.flush();
        }
        if let Err(e) = written {
            self.discard_uncommitted()?;
            return Err(e.into());
        }
        self.committed += block.len() as u64;

        for item in items {
            self.callback.on_written(item);
        }
        self.lines_written += lines.len();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        let footer = self.callback.footer();
        if let Ok(Some(line)) = &footer {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        footer.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Upper;

    impl LineAggregator<String> for Upper {
        fn aggregate(&self, item: &String) -> Result<String> {
            if item.is_empty() {
                return Err(BatchError::format("line", "", "empty"));
            }
            Ok(item.to_uppercase())
        }
    }

    #[derive(Default)]
    struct Counting {
        count: usize,
    }

    impl FlatFileCallback<String> for Counting {
        fn header(&self) -> Result<Option<String>> {
            Ok(Some("HEAD".to_string()))
        }

        fn on_written(&mut self, _item: &String) {
            self.count += 1;
        }

        fn footer(&self) -> Result<Option<String>> {
            if self.count > 3 {
                return Err(BatchError::format("count", self.count.to_string(), "too many"));
            }
            Ok(Some(format!("COUNT={}", self.count)))
        }
    }

    #[test]
    fn test_header_body_footer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, Counting::default());

        writer.open().unwrap();
        writer.write(&["a".to_string(), "b".to_string()]).unwrap();
        writer.write(&["c".to_string()]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "HEAD\nA\nB\nC\nCOUNT=3\n");
        assert_eq!(writer.lines_written(), 3);
    }

    #[test]
    fn test_failed_chunk_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, Counting::default());

        writer.open().unwrap();
        assert!(writer.write(&["a".to_string(), String::new()]).is_err());
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "HEAD\nCOUNT=0\n");
    }

    #[test]
    fn test_open_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, "stale content\n").unwrap();

        let mut writer = FlatFileItemWriter::new(&path, Upper, NoCallback);
        writer.open().unwrap();
        writer.write(&["fresh".to_string()]).unwrap();
        writer.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "FRESH\n");
    }

    #[test]
    fn test_write_before_open_fails() {
        let dir = TempDir::new().unwrap();
        let mut writer = FlatFileItemWriter::new(dir.path().join("x.txt"), Upper, NoCallback);
        assert!(writer.write(&["a".to_string()]).is_err());
    }

    #[test]
    fn test_close_twice_is_harmless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, Counting::default());
        writer.open().unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "HEAD\nCOUNT=0\n");
    }

    #[test]
    fn test_footer_error_fails_close_and_keeps_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, Counting::default());

        writer.open().unwrap();
        let chunk: Vec<String> = ["a", "b", "c", "d"].map(String::from).to_vec();
        writer.write(&chunk).unwrap();
        assert!(matches!(writer.close(), Err(BatchError::Format { .. })));

        assert_eq!(fs::read_to_string(&path).unwrap(), "HEAD\nA\nB\nC\nD\n");
    }

    struct NoHeader;

    impl FlatFileCallback<String> for NoHeader {
        fn header(&self) -> Result<Option<String>> {
            Err(BatchError::format("header", "", "cannot be built"))
        }
    }

    #[test]
    fn test_header_error_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, NoHeader);
        assert!(writer.open().is_err());
        assert!(writer.write(&["a".to_string()]).is_err());
    }

    #[test]
    fn test_partial_chunk_is_cut_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let mut writer = FlatFileItemWriter::new(&path, Upper, Counting::default());

        writer.open().unwrap();
        writer.write(&["a".to_string()]).unwrap();
        // Bytes of a chunk that never completed, some already on disk.
        let out = writer.out.as_mut().unwrap();
        out.write_all(b"PARTIAL\n").unwrap();
        out.flush().unwrap();
        out.write_all(b"BUFFERED\n").unwrap();
        writer.discard_uncommitted().unwrap();

        writer.write(&["b".to_string()]).unwrap();
        writer.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "HEAD\nA\nB\nCOUNT=2\n");
    }
}
