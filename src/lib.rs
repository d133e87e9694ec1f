//! # abono-batch
//!
//! A chunk-oriented payment batch: payments are imported from JSON into a
//! SQLite store, then exported as a fixed-width report with a header and a
//! footer.
//!
//! ## Overview
//!
//! The job runs two steps on the same [`ChunkProcessor`]:
//! - **Json_Import**: [`JsonItemReader`] -> [`RepositoryItemWriter`]
//! - **Txt_Export**: [`RepositoryItemReader`] -> [`ReportTransformer`] ->
//!   [`FlatFileItemWriter`]
//!
//! Items move in chunks of ten. A bad item is handed to an [`ErrorSink`]
//! and left out; the rest of the run goes on.
//!
//! ## Example
//!
//! ```
//! use abono_batch::{Payment, ReportLayout, ReportTransformer};
//! use chrono::NaiveDate;
//!
//! let layout = ReportLayout::default();
//! let payment = Payment {
//!     payment_code: "1".into(),
//!     pis_pasep: "12345678901".into(),
//!     name: "ANA".into(),
//!     birth_date: NaiveDate::from_ymd_opt(1990, 1, 31),
//!     cpf: "12345678900".into(),
//!     amount: 500,
//!     bank: "1".into(),
//!     branch: "10".into(),
//!     account_type: "1".into(),
//!     account: "999".into(),
//!     payment_indicator: "1".into(),
//!     ..Default::default()
//! };
//!
//! let line = ReportTransformer::new(&layout).transform(&payment)?;
//! assert_eq!(line.raw_line().chars().count(), layout.record_length());
//! assert_eq!(line.fields()[10], "000000500");
//! # Ok::<(), abono_batch::BatchError>(())
//! ```

pub mod config;
pub mod error;
pub mod flat_file;
pub mod format;
pub mod item;
pub mod job;
pub mod json_reader;
pub mod layout;
pub mod logging;
pub mod payment;
pub mod report;
pub mod sink;
pub mod skip;
pub mod step;
pub mod store;

pub use config::BatchConfig;
pub use error::{BatchError, ErrorKind, Result};
pub use flat_file::{FlatFileCallback, FlatFileItemWriter, LineAggregator};
pub use format::{FieldKind, format_date, format_field, format_mother_name};
pub use item::{ItemProcessor, ItemReader, ItemWriter, PassThrough};
pub use job::{JobResult, JobStatus, PaymentReportJob};
pub use json_reader::JsonItemReader;
pub use layout::{FieldSpec, ReportLayout};
pub use payment::Payment;
pub use report::{FixedWidthLineAggregator, ReportLine, ReportTrailer, ReportTransformer};
pub use sink::ErrorSink;
pub use skip::{AlwaysSkip, NeverSkip, SkipDecision, SkipLimit, SkipListener, SkipPolicy};
pub use step::{CancellationFlag, ChunkProcessor, StepResult, StepStatus};
pub use store::{
    PaymentRepository, PaymentRowMapper, RepositoryItemReader, RepositoryItemWriter, Row,
    SqliteRepository, Value,
};
