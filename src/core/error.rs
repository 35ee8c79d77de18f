//! Error types for benchnps.

use std::{fmt, path::PathBuf, time::Duration};
use thiserror::Error;

/// The wrapper for the error kind, with an optional hint.
#[derive(Debug)]
pub struct BenchmarkError {
    kind: BenchmarkErrorKind,
    hint: Option<String>,
}

/// Which half of a sample was missing when it reached the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Bench,
    Nps,
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleField::Bench => write!(f, "node count"),
            SampleField::Nps => write!(f, "nps"),
        }
    }
}

/// All types of errors than can occur in benchnps.
#[derive(Error, Debug)]
pub enum BenchmarkErrorKind {
    #[error("Binaries directory does not exist: {path}")]
    BinariesDirectoryNotFound { path: PathBuf },

    #[error("No engine binaries found matching pattern '{pattern}' in {directory}")]
    NoEnginesFound { pattern: String, directory: PathBuf },

    #[error("Engine '{name}' is not known")]
    EngineNotFound { name: String },

    #[error("Engine '{name}' has no binary at {path}")]
    EngineBinaryNotFound { name: String, path: PathBuf },

    #[error("Failed to start engine '{engine}': {source}")]
    EngineSpawnFailed {
        engine: String,
        source: std::io::Error,
    },

    #[error("Engine '{engine}' exited with code {code}")]
    EngineProcessFailed { engine: String, code: i32 },

    #[error("Engine '{engine}' did not finish its bench within {}s", .timeout.as_secs())]
    EngineTimedOut { engine: String, timeout: Duration },

    #[error("Sample set for '{engine}' returned {received} of {expected} results")]
    IncompleteBatch {
        engine: String,
        expected: usize,
        received: usize,
    },

    #[error("Non-deterministic bench for '{engine}': observed node counts {counts:?}")]
    NonDeterminism { engine: String, counts: Vec<u64> },

    #[error("Engine '{engine}' produced a sample without a {field}")]
    IncompleteSample { engine: String, field: SampleField },

    #[error("Invalid output pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Missing required setting: {name}")]
    MissingSetting { name: &'static str },

    #[error("Invalid value for {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] figment::Error),

    #[error("Interrupted before all sample sets completed")]
    Interrupted,

    #[error("{failed} of {total} engine(s) failed to benchmark")]
    EnginesFailed { failed: usize, total: usize },

    #[error("Progress bar template error: {0}")]
    ProgressBarError(#[from] indicatif::style::TemplateError),

    #[error("Template render error: {0}")]
    TemplateRenderError(#[from] handlebars::RenderError),

    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::TemplateError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("JSON Serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BenchmarkError {
    /// Attaches a hint to the error
    pub fn with_hint(mut self, hint: Option<impl Into<String>>) -> Self {
        if let Some(hint) = hint {
            self.hint = Some(hint.into());
        }
        self
    }

    /// The underlying error kind
    pub fn kind(&self) -> &BenchmarkErrorKind {
        &self.kind
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

impl fmt::Display for BenchmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint_text) = &self.hint {
            write!(f, " ({hint_text})")?;
        }

        Ok(())
    }
}

/// Proper error type
impl std::error::Error for BenchmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Convert Error into BenchmarkErrorKind
impl<E> From<E> for BenchmarkError
where
    BenchmarkErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        BenchmarkError {
            kind: BenchmarkErrorKind::from(error),
            hint: None,
        }
    }
}

/// A convenient result type for benchnps
pub type Result<T> = std::result::Result<T, BenchmarkError>;
