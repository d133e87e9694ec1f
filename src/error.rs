//! Error types for the payment batch.
//!
//! Every per-item failure carries enough context for a skip listener to
//! write the offending input to an error side file.

use std::io;
use thiserror::Error;

/// Coarse classification of a [`BatchError`], used by skip policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    Format,
    Store,
    Sink,
    Io,
    Config,
}

/// Errors produced while reading, transforming or writing payments.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed input during decode (JSON fragment or database row).
    #[error("parse error: {message}")]
    Parse { input: String, message: String },

    /// A value cannot be rendered into its fixed width or kind.
    #[error("field `{field}` cannot be rendered from {value:?}: {reason}")]
    Format {
        field: String,
        value: String,
        reason: String,
        /// The unchecked line, when the failure happened while aggregating it.
        line: Option<String>,
    },

    /// Read or write failure against the relational store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Failure to append to an error side file.
    #[error("error sink write failed: {0}")]
    Sink(#[source] io::Error),

    /// Source or target file failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BatchError {
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        BatchError::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn format(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        BatchError::Format {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            line: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::Parse { .. } => ErrorKind::Parse,
            BatchError::Format { .. } => ErrorKind::Format,
            BatchError::Store(_) => ErrorKind::Store,
            BatchError::Sink(_) => ErrorKind::Sink,
            BatchError::Io(_) => ErrorKind::Io,
            BatchError::Config(_) => ErrorKind::Config,
        }
    }

    /// The original text that caused the failure, if the error kept it.
    pub fn raw_input(&self) -> Option<&str> {
        match self {
            BatchError::Parse { input, .. } => Some(input),
            BatchError::Format { line: Some(line), .. } => Some(line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
