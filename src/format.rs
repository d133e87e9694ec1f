//! Fixed-width field formatting.
//!
//! Fields are right-aligned and left-padded: numeric fields with `'0'`,
//! text fields with `' '`. A value that already fills (or exceeds) its
//! width is returned unmodified; overflow is reported by the caller.
//! Widths are counted in characters.

use crate::error::{BatchError, Result};
use chrono::NaiveDate;
use std::fmt::Display;

/// `ddMMyyyy`, the only date layout used in the report.
pub const DATE_FORMAT: &str = "%d%m%Y";

/// Width of a formatted date.
pub const DATE_WIDTH: usize = 8;

/// Padding policy of a fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

impl FieldKind {
    pub fn pad_char(self) -> char {
        match self {
            FieldKind::Numeric => '0',
            FieldKind::Text => ' ',
        }
    }
}

/// Render `value` right-aligned in `width` characters.
pub fn format_field<T: Display + ?Sized>(value: &T, width: usize, kind: FieldKind) -> String {
    let rendered = value.to_string();
    let len = rendered.chars().count();
    if len >= width {
        return rendered;
    }

    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat_n(kind.pad_char(), width - len));
    out.push_str(&rendered);
    out
}

/// Like [`format_field`], but a value longer than `width` is an error.
pub fn fit_field<T: Display + ?Sized>(
    field: &str,
    value: &T,
    width: usize,
    kind: FieldKind,
) -> Result<String> {
    let rendered = format_field(value, width, kind);
    let len = rendered.chars().count();
    if len > width {
        return Err(BatchError::format(
            field,
            rendered,
            format!("{len} characters do not fit width {width}"),
        ));
    }
    Ok(rendered)
}

/// Render a mother's name, substituting `placeholder` for blank input.
pub fn format_mother_name(name: &str, width: usize, placeholder: &str) -> String {
    let name = if name.trim().is_empty() {
        placeholder
    } else {
        name
    };
    format_field(name, width, FieldKind::Text)
}

/// Render a date as `ddMMyyyy`. Missing dates fail instead of rendering blank.
pub fn format_date(field: &str, date: Option<NaiveDate>) -> Result<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .ok_or_else(|| BatchError::format(field, "", "date is required"))
}

/// Ensure `value` can be rendered as a numeric field (ASCII digits only).
pub fn check_numeric(field: &str, value: &str) -> Result<()> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(BatchError::format(field, value, "expected digits only"))
    }
}
