//! Shared output utilities for writing results (CSV, JSON, report).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    benchmark::runner::BenchmarkResult,
    core::{Result, platform::PlatformInfo},
};

pub mod csv;
pub mod json;
pub mod report;
pub use csv::CsvWriter;
pub use json::JsonWriter;
pub use report::ReportWriter;

/// An engine that produced no result, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub engine: String,
    pub reason: String,
}

/// Everything one bench session measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub threads: usize,
    pub sets: usize,
    pub date: String,
    pub platform: PlatformInfo,
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<EngineFailure>,
}

pub trait ResultWriter {
    fn write(&self, summary: &SessionSummary, path: &Path) -> Result<()>;
}

pub fn ensure_output_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write every output format into `output_dir`.
pub fn write_results(summary: &SessionSummary, output_dir: &Path) -> Result<()> {
    ensure_output_dir(output_dir)?;

    let writers: [&dyn ResultWriter; 3] = [&CsvWriter, &JsonWriter, &ReportWriter];
    for writer in writers {
        writer.write(summary, output_dir)?;
    }

    Ok(())
}
