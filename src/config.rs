//! Run configuration, built once at startup and passed by reference.

use crate::error::{BatchError, Result};
use crate::layout::ReportLayout;
use crate::step::DEFAULT_CHUNK_SIZE;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;

pub const DEFAULT_INPUT: &str = "pagamento.json";
pub const DEFAULT_OUTPUT: &str = "pagamento.txt";
pub const DEFAULT_DATABASE: &str = "abono.db";
pub const DEFAULT_IMPORT_ERRORS: &str = "PagamentoAbonoReportJobErrors/ReadErrors/read_errors.txt";
pub const DEFAULT_EXPORT_ERRORS: &str =
    "PagamentoAbonoReportJobErrors/WriteErrors/write_errors.txt";

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub database_path: PathBuf,
    pub import_errors_path: PathBuf,
    pub export_errors_path: PathBuf,
    pub chunk_size: usize,
    /// Date written into the report header.
    pub run_date: NaiveDate,
    pub layout: ReportLayout,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            import_errors_path: PathBuf::from(DEFAULT_IMPORT_ERRORS),
            export_errors_path: PathBuf::from(DEFAULT_EXPORT_ERRORS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            run_date: Local::now().date_naive(),
            layout: ReportLayout::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BatchError::Config("chunk size must be at least 1".to_string()));
        }
        if self.input_path == self.output_path {
            return Err(BatchError::Config(format!(
                "report would overwrite its input {}",
                self.input_path.display()
            )));
        }
        if let Some(field) = self.layout.fields.iter().find(|f| f.width == 0) {
            return Err(BatchError::Config(format!("field `{}` has zero width", field.name)));
        }
        Ok(())
    }
}
