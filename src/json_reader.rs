//! JSON item reader.
//!
//! The source is either a top-level array of objects or a stream of
//! objects separated by whitespace. The document is cut into top-level
//! fragments first and every fragment is decoded on its own, so a
//! malformed item is reported with its exact text and reading carries on
//! with the next one.

use crate::error::{BatchError, Result};
use crate::item::ItemReader;
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonItemReader<T> {
    path: Option<PathBuf>,
    content: String,
    pos: usize,
    in_array: bool,
    finished: bool,
    index: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonItemReader<T> {
    /// Reader over a file, loaded when the reader opens.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::build(Some(path.as_ref().to_path_buf()), String::new())
    }

    /// Reader over an in-memory document.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::build(None, content.into())
    }

    fn build(path: Option<PathBuf>, content: String) -> Self {
        Self {
            path,
            content,
            pos: 0,
            in_array: false,
            finished: false,
            index: 0,
            _item: PhantomData,
        }
    }

    fn rewind(&mut self) {
        let body = self.content.trim_start_matches('\u{feff}');
        self.pos = self.content.len() - body.len();
        self.skip_whitespace();
        self.in_array = self.peek() == Some(b'[');
        if self.in_array {
            self.pos += 1;
        }
        self.finished = false;
        self.index = 0;
    }

    fn peek(&self) -> Option<u8> {
        self.content.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Position where the value starting at `start` ends.
    ///
    /// An unbalanced value does not run on to the end of the document. It
    /// ends where the next item visibly starts: at a `,` followed by `{`
    /// inside an object, before a `{` that is not a member value, or
    /// before a closing bracket that matches nothing the value opened.
    /// None of these can occur in valid JSON.
    fn scan_value(&self, start: usize) -> usize {
        let bytes = self.content.as_bytes();
        let mut open: Vec<u8> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;
        let mut previous = 0u8;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            let before = previous;
            if !b.is_ascii_whitespace() {
                previous = b;
            }
            match b {
                b'"' => in_string = true,
                b'{' if open.last() == Some(&b'{') && before != b':' => return i,
                b'{' | b'[' => open.push(b),
                b'}' | b']' => {
                    let opener = if b == b'}' { b'{' } else { b'[' };
                    let Some(at) = open.iter().rposition(|&o| o == opener) else {
                        return i;
                    };
                    // Brackets left open inside are dropped with their opener.
                    open.truncate(at);
                    if open.is_empty() {
                        return i + 1;
                    }
                }
                b',' if open.is_empty() => return i,
                b',' if open.last() == Some(&b'{')
                    && self.next_non_whitespace(i + 1) == Some(b'{') =>
                {
                    return i;
                }
                b if open.is_empty() && !self.in_array && b.is_ascii_whitespace() => return i,
                _ => {}
            }
        }
        bytes.len()
    }

    fn next_non_whitespace(&self, from: usize) -> Option<u8> {
        self.content.as_bytes()[from..]
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace())
    }

    fn next_fragment(&mut self) -> Option<(usize, usize)> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return None,
                Some(b',') if self.in_array => self.pos += 1,
                Some(b']') if self.in_array => {
                    self.pos += 1;
                    return None;
                }
                Some(_) => break,
            }
        }

        let start = self.pos;
        let mut end = self.scan_value(start);
        if end == start {
            // Stray closing bracket or comma outside an array.
            end = start + self.content[start..].chars().next().map_or(1, char::len_utf8);
        }
        self.pos = end;
        Some((start, end))
    }
}

impl<T: DeserializeOwned> ItemReader<T> for JsonItemReader<T> {
    fn open(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            self.content = fs::read_to_string(path)?;
            debug!(path = %path.display(), bytes = self.content.len(), "json source loaded");
        }
        self.rewind();
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }
        let Some((start, end)) = self.next_fragment() else {
            self.finished = true;
            return Ok(None);
        };

        self.index += 1;
        let fragment = self.content[start..end].trim_end();
        serde_json::from_str(fragment).map(Some).map_err(|e| {
            BatchError::parse(fragment, format!("item {}: {e}", self.index))
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.path.is_some() {
            self.content = String::new();
        }
        Ok(())
    }
}
