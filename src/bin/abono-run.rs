//! CLI tool to run the payment report job.
//!
//! Usage:
//!   abono-run
//!   abono-run -i pagamento.json -o pagamento.txt --database abono.db
//!
//! Exits 0 when the job completed (skipped items included), 1 otherwise.

use abono_batch::config::{
    DEFAULT_DATABASE, DEFAULT_EXPORT_ERRORS, DEFAULT_IMPORT_ERRORS, DEFAULT_INPUT,
    DEFAULT_OUTPUT,
};
use abono_batch::logging::init_logging;
use abono_batch::{BatchConfig, PaymentReportJob, SqliteRepository, StepResult};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Import payments from JSON and export the fixed-width payment report.
#[derive(Parser)]
#[command(name = "abono-run", version)]
struct Cli {
    /// JSON source (array or stream of payment objects)
    #[arg(short, long, env = "ABONO_INPUT", default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Fixed-width report, recreated on every run
    #[arg(short, long, env = "ABONO_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// SQLite database, created if absent
    #[arg(long, env = "ABONO_DATABASE", default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Side file receiving the JSON fragments skipped at import
    #[arg(long, env = "ABONO_IMPORT_ERRORS", default_value = DEFAULT_IMPORT_ERRORS)]
    import_errors: PathBuf,

    /// Side file receiving the records skipped at export
    #[arg(long, env = "ABONO_EXPORT_ERRORS", default_value = DEFAULT_EXPORT_ERRORS)]
    export_errors: PathBuf,

    /// Items per chunk
    #[arg(long, env = "ABONO_CHUNK_SIZE", default_value_t = 10)]
    chunk_size: usize,

    /// Date written in the report header, as YYYY-MM-DD (default: today)
    #[arg(long, env = "ABONO_RUN_DATE")]
    run_date: Option<NaiveDate>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = BatchConfig {
        input_path: cli.input,
        output_path: cli.output,
        database_path: cli.database,
        import_errors_path: cli.import_errors,
        export_errors_path: cli.export_errors,
        chunk_size: cli.chunk_size,
        run_date: cli.run_date.unwrap_or_else(|| Local::now().date_naive()),
        ..Default::default()
    };

    let mut repo = match SqliteRepository::open(&config.database_path) {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!(
                "Error opening database '{}': {e}",
                config.database_path.display()
            );
            process::exit(1);
        }
    };

    let result = match PaymentReportJob::new(&config, &mut repo).run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Job error: {e}");
            process::exit(1);
        }
    };

    eprintln!("Run {}: {:?}", result.run_id, result.status);
    print_step(&result.import);
    match &result.export {
        Some(export) => print_step(export),
        None => eprintln!("  Txt_Export: not run"),
    }

    if !result.is_completed() {
        process::exit(1);
    }
}

fn print_step(step: &StepResult) {
    eprintln!(
        "  {}: {:?}, read {}, written {}, skipped {} (read {}, process {}, write {})",
        step.name,
        step.status,
        step.read_count,
        step.write_count,
        step.skip_count(),
        step.read_skip_count,
        step.process_skip_count,
        step.write_skip_count,
    );
}
