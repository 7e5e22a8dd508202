//! dedupe-run
//!
//! One incremental ingestion run: load rules, read the cursor, fetch new
//! practice records, derive matching keys, advance the cursor. Normalized
//! records are written as JSON lines to stdout (or `OUTPUT_PATH`) before the
//! cursor moves; if that write fails the cursor is left alone. Logs go to
//! stderr.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use envconfig::Envconfig;
use tracing_subscriber::EnvFilter;

use practice_dedupe::config::Config;
use practice_dedupe::{
    Cursor, DedupeError, FileCursorStore, JsonLinesSource, NormalizedRecord, Pipeline,
    SourceCredentials, SourceError,
};

fn write_records(records: &[NormalizedRecord], output_path: Option<&str>) -> io::Result<()> {
    let sink: Box<dyn Write> = match output_path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration from env");
            return ExitCode::FAILURE;
        }
    };

    let cursor = Cursor::new(FileCursorStore::new(&config.cursor_path));
    let pipeline = match Pipeline::new(config.pipeline_config(), cursor) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let error = DedupeError::from(e);
            tracing::error!(error = %error, "invalid pipeline configuration");
            return ExitCode::FAILURE;
        }
    };

    let records_path = config.records_path.clone();
    let connector = move |_: &SourceCredentials| -> Result<JsonLinesSource, SourceError> {
        JsonLinesSource::open(&records_path)
    };

    let output_path = config.output_path.clone();
    let mut sink = |records: &[NormalizedRecord]| write_records(records, output_path.as_deref());

    let report = pipeline.run_into(&config.credentials(), &connector, &mut sink);

    let state = report.final_state();
    match report.error {
        None => {
            tracing::info!(
                fetched = report.fetched,
                rules_fallback = report.rules_fallback,
                "all done"
            );
            ExitCode::SUCCESS
        }
        Some(e) => {
            let error = DedupeError::from(e);
            tracing::error!(
                %state,
                error = %error,
                retryable = error.is_retryable(),
                "run did not complete"
            );
            ExitCode::FAILURE
        }
    }
}
