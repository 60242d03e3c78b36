mod json;
mod terminal;
pub mod usage;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;
pub use usage::{UsageEntry, UsageEntryKind, UsageReport};

use crate::shrink::ShrinkSummary;
use miette::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format for the shrink summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

/// Reporter for the outcome of a shrinking run
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            output_path,
        }
    }

    pub fn report(&self, summary: &ShrinkSummary) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => TerminalReporter::new().report(summary),
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).report(summary),
        }
    }
}
