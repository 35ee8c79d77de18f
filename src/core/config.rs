//! Layered configuration: defaults, then the TOML config file, then `BENCHNPS_*`
//! environment variables, then whatever the command line sets.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::core::error::{BenchmarkErrorKind, Result};

pub const ENV_PREFIX: &str = "BENCHNPS_";

/// Matches `<digits> NPS` or `NPS <digits>` on a normalized line.
pub const DEFAULT_NPS_PATTERN: &str = r"([0-9]+ NPS)|(NPS[ ]+[0-9]+)";

/// Matches `<digits> NODES` or `NODES <digits>` on a normalized line.
pub const DEFAULT_NODES_PATTERN: &str = r"([0-9]+ NODES)|(NODES[ ]+[0-9]+)";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Concurrent bench processes per sample set. Required.
    pub threads: Option<usize>,
    /// Number of sample sets. Required.
    pub sets: Option<usize>,
    pub binaries_dir: PathBuf,
    pub pattern: Option<String>,
    /// Restrict the session to these engine names.
    pub engines: Vec<String>,
    pub timeout_secs: u64,
    pub output: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            threads: None,
            sets: None,
            binaries_dir: PathBuf::from("Binaries"),
            pattern: None,
            engines: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output: None,
        }
    }
}

/// Patterns handed to the output parser when an engine doesn't bring its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub nps_patterns: Vec<String>,
    pub nodes_patterns: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            nps_patterns: vec![DEFAULT_NPS_PATTERN.to_string()],
            nodes_patterns: vec![DEFAULT_NODES_PATTERN.to_string()],
        }
    }
}

/// One `[engines.<name>]` table. Without a `path` it only overrides the
/// patterns of a binary discovered in the binaries directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineEntry {
    pub path: Option<PathBuf>,
    pub nps_patterns: Option<Vec<String>>,
    pub nodes_patterns: Option<Vec<String>>,
}

/// Resolved, validated numbers for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePlan {
    pub threads: usize,
    pub sets: usize,
    pub timeout: Duration,
}

impl SamplePlan {
    pub fn total_samples(&self) -> usize {
        self.threads * self.sets
    }
}

/// Command line values, merged on top of every other layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sets: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binaries_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Everything a bench session needs, extracted from one figment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub global: GlobalConfig,
    pub bench: BenchConfig,
    pub parser: ParserConfig,
    pub engines: BTreeMap<String, EngineEntry>,
}

/// Default location of the config file, `<config dir>/benchnps/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("benchnps").join("config.toml"))
}

/// Build the file and environment layers. A missing file is an empty layer.
pub fn create_figment_from_file(path: &Path) -> Result<Figment> {
    if path.is_dir() {
        return Err(BenchmarkErrorKind::InvalidSetting {
            name: "config",
            reason: format!("{} is a directory", path.display()),
        }
        .into());
    }

    tracing::debug!("Loading config from {}", path.display());

    Ok(Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Environment layer only, used when no config file is available.
pub fn create_figment() -> Figment {
    Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Put command line values on top of the file and environment layers.
pub fn merge_cli_overrides(figment: Figment, verbose: bool, bench: &BenchOverrides) -> Figment {
    let figment = figment.merge(Serialized::default("bench", bench));
    if verbose {
        figment.merge(Serialized::default("global.verbose", true))
    } else {
        figment
    }
}

fn extract_section<T: DeserializeOwned + Default>(figment: &Figment, key: &str) -> Result<T> {
    if figment.contains(key) {
        Ok(figment.extract_inner(key)?)
    } else {
        Ok(T::default())
    }
}

impl GlobalConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        extract_section(figment, "global")
    }
}

impl BenchConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        extract_section(figment, "bench")
    }

    /// Thread and set counts have no default: leaving one out is a usage error.
    pub fn sample_plan(&self) -> Result<SamplePlan> {
        let threads = self.threads.ok_or(BenchmarkErrorKind::MissingSetting {
            name: "bench.threads",
        })?;
        let sets = self
            .sets
            .ok_or(BenchmarkErrorKind::MissingSetting { name: "bench.sets" })?;

        if threads == 0 {
            return Err(BenchmarkErrorKind::InvalidSetting {
                name: "bench.threads",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if sets == 0 {
            return Err(BenchmarkErrorKind::InvalidSetting {
                name: "bench.sets",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.timeout_secs == 0 {
            return Err(BenchmarkErrorKind::InvalidSetting {
                name: "bench.timeout_secs",
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }

        Ok(SamplePlan {
            threads,
            sets,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

impl ParserConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        extract_section(figment, "parser")
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(Self {
            global: GlobalConfig::from_figment(figment)?,
            bench: BenchConfig::from_figment(figment)?,
            parser: ParserConfig::from_figment(figment)?,
            engines: extract_section(figment, "engines")?,
        })
    }
}
