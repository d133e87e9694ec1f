//! Relational store access.
//!
//! Steps only reach the database through a [`PaymentRepository`]: the
//! import step saves whole chunks through [`RepositoryItemWriter`], the
//! export step pages through the fixed join query with a
//! [`RepositoryItemReader`] and turns every [`Row`] into a payment with a
//! [`RowMapper`].

mod mapper;
mod sqlite;

pub use mapper::{PaymentRowMapper, RowMapper};
pub use sqlite::SqliteRepository;

use crate::error::{BatchError, Result};
use crate::item::{ItemReader, ItemWriter};
use crate::payment::Payment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::{io, vec};
use tracing::debug;

/// Three-way join feeding the export step.
pub const EXPORT_QUERY: &str = "SELECT * FROM tb_pagamento \
INNER JOIN tb_trabalhador ON tb_pagamento.fk_trabalhador_id = tb_trabalhador.trabalhador_id \
INNER JOIN tb_banco ON tb_pagamento.fk_banco_id = tb_banco.banco_id";

/// A column value, independent of the store driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.insert(column, value);
        self
    }

    /// Later columns with the same name replace earlier ones.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// JSON object rendering, as written to the error side files.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Run status recorded when a job finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Stopped => "STOPPED",
        }
    }
}

pub trait PaymentRepository {
    fn save(&mut self, payment: &Payment) -> Result<()>;

    /// Save every payment or none of them.
    fn save_all(&mut self, payments: &[Payment]) -> Result<()>;

    fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// At most `limit` rows of `sql`, skipping the first `offset`. Pages
    /// line up as long as the store is not written between calls.
    fn query_page(&self, sql: &str, limit: usize, offset: usize) -> Result<Vec<Row>>;

    /// Register a new run of `job_name` and return its identifier.
    /// Identifiers increase strictly across runs.
    fn start_run(&mut self, job_name: &str) -> Result<i64>;

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> Result<()>;
}

/// Writes each chunk in one store transaction.
pub struct RepositoryItemWriter<'r> {
    repo: &'r mut dyn PaymentRepository,
}

impl<'r> RepositoryItemWriter<'r> {
    pub fn new(repo: &'r mut dyn PaymentRepository) -> Self {
        Self { repo }
    }
}

impl ItemWriter<Payment> for RepositoryItemWriter<'_> {
    fn write(&mut self, items: &[Payment]) -> Result<()> {
        self.repo.save_all(items)
    }
}

pub const DEFAULT_FETCH_SIZE: usize = 100;

/// Pages through a query and maps its rows one read at a time. At most one
/// page of rows is held in memory.
pub struct RepositoryItemReader<'r, M> {
    repo: &'r dyn PaymentRepository,
    sql: String,
    mapper: M,
    fetch_size: usize,
    offset: usize,
    exhausted: bool,
    failed: bool,
    rows: vec::IntoIter<Row>,
}

impl<'r, M> RepositoryItemReader<'r, M> {
    pub fn new(repo: &'r dyn PaymentRepository, sql: impl Into<String>, mapper: M) -> Self {
        Self {
            repo,
            sql: sql.into(),
            mapper,
            fetch_size: DEFAULT_FETCH_SIZE,
            offset: 0,
            exhausted: false,
            failed: false,
            rows: Vec::new().into_iter(),
        }
    }

    /// Rows fetched per page (at least one).
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    fn fetch_page(&mut self) -> Result<()> {
        // A page that fails ends the cursor; close reports it.
        self.exhausted = true;
        let rows = match self.repo.query_page(&self.sql, self.fetch_size, self.offset) {
            Ok(rows) => rows,
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };
        debug!(offset = self.offset, rows = rows.len(), "export page fetched");
        self.exhausted = rows.len() < self.fetch_size;
        self.offset += rows.len();
        self.rows = rows.into_iter();
        Ok(())
    }
}

impl<T, M: RowMapper<T>> ItemReader<T> for RepositoryItemReader<'_, M> {
    fn open(&mut self) -> Result<()> {
        self.offset = 0;
        self.failed = false;
        self.fetch_page()
    }

    fn read(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(row) = self.rows.next() {
                return self.mapper.map_row(&row).map(Some);
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page()?;
        }
    }

    fn close(&mut self) -> Result<()> {
        self.rows = Vec::new().into_iter();
        self.exhausted = true;
        if self.failed {
            return Err(BatchError::Io(io::Error::other(format!(
                "query stopped after {} rows",
                self.offset
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::sample_payment;

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new()
            .with("nome", Value::Text("ANA".into()))
            .with("valor_pagamento", Value::Integer(500))
            .with("nascimento", Value::Null);
        assert_eq!(
            row.to_json(),
            r#"{"nascimento":null,"nome":"ANA","valor_pagamento":500}"#
        );
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_writer_and_reader_round_trip() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        let mut second = sample_payment();
        second.payment_code = "1002".into();

        RepositoryItemWriter::new(&mut repo)
            .write(&[sample_payment(), second])
            .unwrap();

        let mut reader = RepositoryItemReader::new(&repo, EXPORT_QUERY, PaymentRowMapper);
        ItemReader::<Payment>::open(&mut reader).unwrap();
        let mut codes = Vec::new();
        while let Some(p) = ItemReader::<Payment>::read(&mut reader).unwrap() {
            codes.push(p.payment_code);
        }
        codes.sort();
        assert_eq!(codes, vec!["1001", "1002"]);
    }

    #[test]
    fn test_reader_pages_through_all_rows() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        let payments: Vec<Payment> = (1..=5)
            .map(|i| Payment {
                payment_code: format!("{}", 1000 + i),
                ..sample_payment()
            })
            .collect();
        RepositoryItemWriter::new(&mut repo).write(&payments).unwrap();

        for fetch_size in [1, 2, 5, 7] {
            let mut reader = RepositoryItemReader::new(&repo, EXPORT_QUERY, PaymentRowMapper)
                .with_fetch_size(fetch_size);
            ItemReader::<Payment>::open(&mut reader).unwrap();
            let mut codes = Vec::new();
            while let Some(p) = ItemReader::<Payment>::read(&mut reader).unwrap() {
                codes.push(p.payment_code);
            }
            ItemReader::<Payment>::close(&mut reader).unwrap();
            codes.sort();
            assert_eq!(
                codes,
                vec!["1001", "1002", "1003", "1004", "1005"],
                "fetch size {fetch_size}"
            );
        }
    }

    #[test]
    fn test_failed_page_ends_reader_and_fails_close() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        let second = Payment {
            payment_code: "1002".into(),
            ..sample_payment()
        };
        RepositoryItemWriter::new(&mut repo)
            .write(&[sample_payment(), second])
            .unwrap();

        let mut reader =
            RepositoryItemReader::new(&repo, EXPORT_QUERY, PaymentRowMapper).with_fetch_size(1);
        ItemReader::<Payment>::open(&mut reader).unwrap();
        repo.connection()
            .execute_batch("ALTER TABLE tb_banco RENAME TO tb_banco_moved")
            .unwrap();

        assert!(ItemReader::<Payment>::read(&mut reader).unwrap().is_some());
        assert!(ItemReader::<Payment>::read(&mut reader).is_err());
        assert!(ItemReader::<Payment>::read(&mut reader).unwrap().is_none());
        assert!(ItemReader::<Payment>::close(&mut reader).is_err());
    }

    #[test]
    fn test_reader_fails_on_bad_query() {
        let repo = SqliteRepository::in_memory().unwrap();
        let mut reader =
            RepositoryItemReader::new(&repo, "SELECT * FROM nowhere", PaymentRowMapper);
        assert!(ItemReader::<Payment>::open(&mut reader).is_err());
    }
}
