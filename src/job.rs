//! The payment report job: JSON import followed by the fixed-width export.
//!
//! ```text
//! pagamento.json -> [Json_Import] -> store -> [Txt_Export] -> pagamento.txt
//!                        |                         |
//!                  import error file         export error file
//! ```
//!
//! The export only starts once the import step has finished normally. A
//! step that skipped items still counts as finished; only a fatal abort or
//! a cancellation stops the job.

use crate::config::BatchConfig;
use crate::error::Result;
use crate::flat_file::FlatFileItemWriter;
use crate::item::PassThrough;
use crate::json_reader::JsonItemReader;
use crate::payment::Payment;
use crate::report::{FixedWidthLineAggregator, ReportLine, ReportTrailer, ReportTransformer};
use crate::sink::ErrorSink;
use crate::skip::{AlwaysSkip, SkipPolicy};
use crate::step::{CancellationFlag, ChunkProcessor, StepResult, StepStatus};
use crate::store::{
    EXPORT_QUERY, PaymentRepository, PaymentRowMapper, RepositoryItemReader,
    RepositoryItemWriter, RunStatus,
};
use std::time::Instant;
use tracing::{info, warn};

pub const JOB_NAME: &str = "Pagamento_Abono_Report_Job";
pub const IMPORT_STEP: &str = "Json_Import";
pub const EXPORT_STEP: &str = "Txt_Export";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Both steps ran to the end, skips included.
    Completed,
    /// A step aborted.
    Failed,
    /// The run was cancelled between chunks.
    Stopped,
}

impl From<JobStatus> for RunStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Completed => RunStatus::Completed,
            JobStatus::Failed => RunStatus::Failed,
            JobStatus::Stopped => RunStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub run_id: i64,
    pub import: StepResult,
    /// `None` when the import did not finish.
    pub export: Option<StepResult>,
    pub status: JobStatus,
}

impl JobResult {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

pub struct PaymentReportJob<'a> {
    config: &'a BatchConfig,
    repo: &'a mut dyn PaymentRepository,
    skip_policy: Box<dyn SkipPolicy>,
    cancel: CancellationFlag,
}

impl<'a> PaymentReportJob<'a> {
    /// Job skipping every per-item failure in both steps.
    pub fn new(config: &'a BatchConfig, repo: &'a mut dyn PaymentRepository) -> Self {
        Self {
            config,
            repo,
            skip_policy: Box::new(AlwaysSkip),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_skip_policy(mut self, policy: impl SkipPolicy + 'static) -> Self {
        self.skip_policy = Box::new(policy);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run both steps under a new run identifier.
    ///
    /// Returns an error only when the configuration is invalid or the run
    /// cannot be registered in the store; step failures are reported in
    /// the returned [`JobResult`].
    pub fn run(&mut self) -> Result<JobResult> {
        self.config.validate()?;
        let started = Instant::now();
        let run_id = self.repo.start_run(JOB_NAME)?;
        info!(job = JOB_NAME, run_id, "job started");

        let policy: &dyn SkipPolicy = &*self.skip_policy;
        let step = ChunkProcessor::new(self.config.chunk_size, policy)?
            .with_cancellation(self.cancel.clone());

        let import = run_import(self.config, &mut *self.repo, &step);
        let export = if import.is_done() {
            Some(run_export(self.config, &*self.repo, &step))
        } else {
            warn!(job = JOB_NAME, run_id, "import did not finish, export skipped");
            None
        };

        let status = job_status(&import, export.as_ref());
        self.repo.finish_run(run_id, status.into())?;
        info!(
            job = JOB_NAME,
            run_id,
            status = ?status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job finished"
        );

        Ok(JobResult {
            run_id,
            import,
            export,
            status,
        })
    }
}

fn job_status(import: &StepResult, export: Option<&StepResult>) -> JobStatus {
    let mut status = JobStatus::Completed;
    for step in std::iter::once(import).chain(export) {
        match step.status {
            StepStatus::Done => {}
            StepStatus::FatalAborted { .. } => return JobStatus::Failed,
            StepStatus::Cancelled => status = JobStatus::Stopped,
        }
    }
    status
}

fn run_import(
    config: &BatchConfig,
    repo: &mut dyn PaymentRepository,
    step: &ChunkProcessor<'_>,
) -> StepResult {
    let mut reader = JsonItemReader::<Payment>::from_path(&config.input_path);
    let mut writer = RepositoryItemWriter::new(repo);
    let mut errors = ErrorSink::new(&config.import_errors_path);

    let result = step.run::<Payment, Payment>(
        IMPORT_STEP,
        &mut reader,
        &PassThrough,
        &mut writer,
        &mut errors,
    );
    report_sink(IMPORT_STEP, &errors);
    result
}

fn run_export(
    config: &BatchConfig,
    repo: &dyn PaymentRepository,
    step: &ChunkProcessor<'_>,
) -> StepResult {
    let layout = &config.layout;
    let mut reader = RepositoryItemReader::new(repo, EXPORT_QUERY, PaymentRowMapper);
    let transformer = ReportTransformer::new(layout);
    let mut writer = FlatFileItemWriter::new(
        &config.output_path,
        FixedWidthLineAggregator::new(layout),
        ReportTrailer::new(layout, config.run_date),
    );
    let mut errors = ErrorSink::new(&config.export_errors_path);

    let result = step.run::<Payment, ReportLine>(
        EXPORT_STEP,
        &mut reader,
        &transformer,
        &mut writer,
        &mut errors,
    );
    let trailer = writer.callback();
    info!(
        path = %config.output_path.display(),
        records = trailer.count(),
        total = trailer.total(),
        "report written"
    );
    report_sink(EXPORT_STEP, &errors);
    result
}

fn report_sink(step: &str, sink: &ErrorSink) {
    if sink.recorded() > 0 {
        info!(step, path = %sink.path().display(), items = sink.recorded(), "skips recorded");
    }
    if sink.dropped() > 0 {
        warn!(step, path = %sink.path().display(), items = sink.dropped(), "skips lost");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skip::NeverSkip;
    use crate::store::SqliteRepository;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path) -> BatchConfig {
        BatchConfig {
            input_path: dir.join("pagamento.json"),
            output_path: dir.join("out/pagamento.txt"),
            database_path: dir.join("abono.db"),
            import_errors_path: dir.join("errors/read_errors.txt"),
            export_errors_path: dir.join("errors/write_errors.txt"),
            run_date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            ..Default::default()
        }
    }

    fn payment_json(code: &str, pis: &str) -> String {
        format!(
            r#"{{"codigoPagamento": "{code}", "pisPasep": "{pis}", "nome": "ANA",
                "nascimento": "1990-01-31", "cpf": "12345678900", "nomeMae": "",
                "valorPagamento": 100, "mesesTrabalhados": 6, "banco": "1",
                "agencia": "10", "digitoVerificador": "X", "tipoConta": "1",
                "conta": "999", "indicadorPagamento": "1"}}"#
        )
    }

    #[test]
    fn test_job_runs_both_steps() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::write(
            &config.input_path,
            format!("[{}, {}]", payment_json("1", "111"), payment_json("2", "222")),
        )
        .unwrap();
        let mut repo = SqliteRepository::in_memory().unwrap();

        let result = PaymentReportJob::new(&config, &mut repo).run().unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.import.write_count, 2);
        let export = result.export.unwrap();
        assert_eq!(export.write_count, 2);

        let report = fs::read_to_string(&config.output_path).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("11446954311"));
        assert!(lines[3].starts_with("31000000002"));
        assert!(lines.iter().all(|l| l.chars().count() == 300));
        assert!(!config.import_errors_path.exists());
    }

    #[test]
    fn test_missing_input_fails_job_and_skips_export() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let mut repo = SqliteRepository::in_memory().unwrap();

        let result = PaymentReportJob::new(&config, &mut repo).run().unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        assert!(matches!(result.import.status, StepStatus::FatalAborted { .. }));
        assert!(result.export.is_none());
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_strict_policy_aborts_on_bad_item() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let input = format!("[{}, {{\"x\": }}]", payment_json("1", "1"));
        fs::write(&config.input_path, input).unwrap();
        let mut repo = SqliteRepository::in_memory().unwrap();

        let result = PaymentReportJob::new(&config, &mut repo)
            .with_skip_policy(NeverSkip)
            .run()
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.export.is_none());
    }

    #[test]
    fn test_footer_overflow_fails_export() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.layout.total_width = 2;
        fs::write(
            &config.input_path,
            format!("[{}, {}]", payment_json("1", "111"), payment_json("2", "222")),
        )
        .unwrap();
        let mut repo = SqliteRepository::in_memory().unwrap();

        let result = PaymentReportJob::new(&config, &mut repo).run().unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        let export = result.export.unwrap();
        assert!(matches!(export.status, StepStatus::FatalAborted { .. }));
        assert_eq!(export.write_count, 2);
        let report = fs::read_to_string(&config.output_path).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(!lines[2].starts_with("31"));
    }

    #[test]
    fn test_cancelled_job_is_stopped() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::write(&config.input_path, "[]").unwrap();
        let mut repo = SqliteRepository::in_memory().unwrap();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = PaymentReportJob::new(&config, &mut repo)
            .with_cancellation(cancel)
            .run()
            .unwrap();

        assert_eq!(result.status, JobStatus::Stopped);
        assert_eq!(result.import.status, StepStatus::Cancelled);
        let rows = repo.query("SELECT status FROM batch_job_run").unwrap();
        assert_eq!(
            rows[0].get("status"),
            Some(&crate::store::Value::Text("STOPPED".into()))
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_before_run() {
        let dir = TempDir::new().unwrap();
        let config = BatchConfig {
            chunk_size: 0,
            ..config(dir.path())
        };
        let mut repo = SqliteRepository::in_memory().unwrap();
        assert!(PaymentReportJob::new(&config, &mut repo).run().is_err());
        assert!(repo.query("SELECT * FROM batch_job_run").unwrap().is_empty());
    }
}
