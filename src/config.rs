//! Process configuration for the `dedupe-run` binary, read from the environment.

use std::path::PathBuf;

use envconfig::Envconfig;

use crate::pipeline::{PipelineConfig, SourceCredentials};

/// Environment settings for one run.
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[envconfig(from = "SUPABASE_KEY")]
    pub supabase_key: Option<String>,

    #[envconfig(from = "RULES_PATH", default = "normalization_rules.json")]
    pub rules_path: String,

    #[envconfig(from = "CURSOR_PATH", default = "dedupe_log.json")]
    pub cursor_path: String,

    // JSON-lines export of the practice_records table
    #[envconfig(from = "RECORDS_PATH", default = "practice_records.jsonl")]
    pub records_path: String,

    #[envconfig(from = "PAGE_SIZE", default = "1000")]
    pub page_size: usize,

    #[envconfig(from = "MAX_PAGES", default = "10000")]
    pub max_pages: usize,

    #[envconfig(from = "WORKERS", default = "1")]
    pub workers: usize,

    // stdout when unset
    #[envconfig(from = "OUTPUT_PATH")]
    pub output_path: Option<String>,
}

impl Config {
    /// Pipeline settings; not yet validated.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            rules_path: PathBuf::from(&self.rules_path),
            page_size: self.page_size,
            max_pages: self.max_pages,
            workers: self.workers,
        }
    }

    /// Data-store credentials; missing parts are reported when the run starts.
    #[must_use]
    pub fn credentials(&self) -> SourceCredentials {
        SourceCredentials::new(self.supabase_url.clone(), self.supabase_key.clone())
    }
}
