//! Tests for configuration prioritization.
//!
//! Configuration values are resolved according to this hierarchy:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (BENCHNPS_*)
//! 3. Config file
//! 4. Default values (lowest priority)
//!
//! Environment variables are process-global, so every test takes `ENV_LOCK`
//! and starts from a clean `BENCHNPS_*` environment.
//!
//! Environment variables use double underscore (`__`) to separate the section
//! from the field name, e.g. `BENCHNPS_BENCH__THREADS` → `bench.threads`.

use benchnps::BenchmarkErrorKind;
use benchnps::core::config::{
    AppConfig, BenchConfig, BenchOverrides, DEFAULT_NPS_PATTERN, GlobalConfig, ParserConfig,
    create_figment_from_file, merge_cli_overrides,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

static ENV_LOCK: Mutex<()> = Mutex::new(());

// =============================================================================
// Helper Functions
// =============================================================================

/// Take the environment lock and clear all BENCHNPS_* environment variables
fn clean_env() -> MutexGuard<'static, ()> {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let vars_to_clear: Vec<String> = std::env::vars()
        .filter(|(k, _)| k.starts_with("BENCHNPS_"))
        .map(|(k, _)| k)
        .collect();
    for var in vars_to_clear {
        unsafe {
            std::env::remove_var(&var);
        }
    }

    guard
}

fn set_env(key: &str, value: &str) {
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Creates a temporary config file with the given TOML content
fn create_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file.flush().expect("Failed to flush");
    file
}

const FILE_CONFIG: &str = r#"
[global]
verbose = true

[bench]
threads = 8
sets = 5
binaries_dir = "/opt/engines"
timeout_secs = 60
engines = ["Ethereal", "Laser"]

[parser]
nps_patterns = ["SPEED[ ]+[0-9]+"]

[engines.Torch]
path = "/opt/torch/torch-dev"

[engines.Weiss]
nodes_patterns = ["SEARCHED[ ]+[0-9]+"]
"#;

// =============================================================================
// Default Value Tests
// =============================================================================

#[test]
fn test_default_values() {
    let _env = clean_env();

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "").unwrap();

    let figment = create_figment_from_file(&config_path).expect("Failed to create figment");
    let config = AppConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config.global, GlobalConfig::default());
    assert_eq!(config.bench.threads, None, "threads has no default");
    assert_eq!(config.bench.sets, None, "sets has no default");
    assert_eq!(config.bench.binaries_dir, PathBuf::from("Binaries"));
    assert_eq!(config.bench.timeout_secs, 300);
    assert!(config.bench.engines.is_empty());
    assert!(config.bench.output.is_none());
    assert_eq!(config.parser, ParserConfig::default());
    assert!(config.engines.is_empty());
}

#[test]
fn test_missing_file_is_an_empty_layer() {
    let _env = clean_env();

    let temp_dir = TempDir::new().unwrap();
    let figment = create_figment_from_file(&temp_dir.path().join("absent.toml"))
        .expect("Failed to create figment");
    let config = BenchConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config, BenchConfig::default());
}

#[test]
fn test_directory_is_rejected_as_config_file() {
    let _env = clean_env();

    let temp_dir = TempDir::new().unwrap();
    let err = create_figment_from_file(temp_dir.path()).unwrap_err();
    assert!(matches!(
        err.kind(),
        BenchmarkErrorKind::InvalidSetting { name: "config", .. }
    ));
}

// =============================================================================
// Config File Tests
// =============================================================================

#[test]
fn test_values_from_file() {
    let _env = clean_env();

    let config_file = create_config_file(FILE_CONFIG);
    let figment = create_figment_from_file(config_file.path()).expect("Failed to create figment");
    let config = AppConfig::from_figment(&figment).expect("Failed to load config");

    assert!(config.global.verbose);
    assert_eq!(config.bench.threads, Some(8));
    assert_eq!(config.bench.sets, Some(5));
    assert_eq!(config.bench.binaries_dir, PathBuf::from("/opt/engines"));
    assert_eq!(config.bench.timeout_secs, 60);
    assert_eq!(config.bench.engines, vec!["Ethereal", "Laser"]);

    assert_eq!(config.parser.nps_patterns, vec!["SPEED[ ]+[0-9]+"]);
    assert_eq!(
        config.parser.nodes_patterns,
        ParserConfig::default().nodes_patterns,
        "unset pattern lists keep their defaults"
    );

    let torch = &config.engines["Torch"];
    assert_eq!(torch.path, Some(PathBuf::from("/opt/torch/torch-dev")));
    assert!(torch.nps_patterns.is_none());

    let weiss = &config.engines["Weiss"];
    assert!(weiss.path.is_none());
    assert_eq!(
        weiss.nodes_patterns,
        Some(vec!["SEARCHED[ ]+[0-9]+".to_string()])
    );

    let plan = config.bench.sample_plan().unwrap();
    assert_eq!(plan.threads, 8);
    assert_eq!(plan.sets, 5);
    assert_eq!(plan.timeout, Duration::from_secs(60));
}

#[test]
fn test_invalid_file_value_is_a_config_error() {
    let _env = clean_env();

    let config_file = create_config_file("[bench]\nthreads = \"many\"\n");
    let figment = create_figment_from_file(config_file.path()).expect("Failed to create figment");
    let err = BenchConfig::from_figment(&figment).unwrap_err();

    assert!(matches!(err.kind(), BenchmarkErrorKind::ConfigError(_)));
}

// =============================================================================
// Environment Variable Tests
// =============================================================================

#[test]
fn test_env_overrides_file() {
    let _env = clean_env();
    set_env("BENCHNPS_BENCH__THREADS", "16");
    set_env("BENCHNPS_BENCH__TIMEOUT_SECS", "30");

    let config_file = create_config_file(FILE_CONFIG);
    let figment = create_figment_from_file(config_file.path()).expect("Failed to create figment");
    let config = BenchConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config.threads, Some(16), "env should override the file");
    assert_eq!(config.timeout_secs, 30, "env should override the file");
    assert_eq!(config.sets, Some(5), "file value should remain");
}

#[test]
fn test_env_without_file() {
    let _env = clean_env();
    set_env("BENCHNPS_BENCH__SETS", "3");

    let temp_dir = TempDir::new().unwrap();
    let figment = create_figment_from_file(&temp_dir.path().join("absent.toml"))
        .expect("Failed to create figment");
    let config = BenchConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config.sets, Some(3));
    assert_eq!(config.threads, None);
}

// =============================================================================
// CLI Override Tests
// =============================================================================

#[test]
fn test_cli_overrides_env_and_file() {
    let _env = clean_env();
    set_env("BENCHNPS_BENCH__THREADS", "16");

    let config_file = create_config_file(FILE_CONFIG);
    let figment = create_figment_from_file(config_file.path()).expect("Failed to create figment");

    let overrides = BenchOverrides {
        threads: Some(2),
        engines: vec!["Torch".to_string()],
        output: Some(PathBuf::from("out")),
        ..BenchOverrides::default()
    };
    let figment = merge_cli_overrides(figment, false, &overrides);
    let config = AppConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config.bench.threads, Some(2), "CLI should win over env");
    assert_eq!(config.bench.sets, Some(5), "file value should remain");
    assert_eq!(config.bench.engines, vec!["Torch"]);
    assert_eq!(config.bench.output, Some(PathBuf::from("out")));
    assert!(config.global.verbose, "--verbose absent keeps the file value");
}

#[test]
fn test_unset_cli_values_do_not_override() {
    let _env = clean_env();

    let config_file = create_config_file(FILE_CONFIG);
    let figment = create_figment_from_file(config_file.path()).expect("Failed to create figment");
    let figment = merge_cli_overrides(figment, true, &BenchOverrides::default());
    let config = AppConfig::from_figment(&figment).expect("Failed to load config");

    assert_eq!(config.bench.threads, Some(8));
    assert_eq!(config.bench.engines, vec!["Ethereal", "Laser"]);
    assert!(config.global.verbose);
}

#[test]
fn test_cli_verbose_without_file() {
    let _env = clean_env();

    let temp_dir = TempDir::new().unwrap();
    let figment = create_figment_from_file(&temp_dir.path().join("absent.toml"))
        .expect("Failed to create figment");
    let figment = merge_cli_overrides(figment, true, &BenchOverrides::default());
    let config = AppConfig::from_figment(&figment).expect("Failed to load config");

    assert!(config.global.verbose);
    assert_eq!(config.parser.nps_patterns, vec![DEFAULT_NPS_PATTERN]);
}
