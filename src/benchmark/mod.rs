pub mod discovery;
pub mod parser;
pub mod runner;

use std::{
    path::Path,
    sync::{Arc, atomic::AtomicBool},
};

use chrono::Local;

use crate::core::{
    AppConfig, Result,
    error::BenchmarkErrorKind,
    output::{self, EngineFailure, SessionSummary},
    platform::PlatformInfo,
};
use parser::Sample;
use runner::{Aggregator, BenchmarkResult};

/// Bench every engine, print the summary table and write the optional outputs.
///
/// A failing engine doesn't stop the session; the error is returned once every
/// other engine has been measured.
pub async fn run(config: AppConfig, running: &Arc<AtomicBool>) -> Result<()> {
    let summary = run_session(&config, running).await?;

    for result in &summary.results {
        println!("{}", format_result_line(result));
    }

    if let Some(output_dir) = config.bench.output.as_deref() {
        tracing::debug!("Output directory: {}", output_dir.display());
        output::write_results(&summary, output_dir)?;
    }

    tracing::info!("Bench complete!");
    tracing::info!(
        "Engines measured: {}, failed: {}",
        summary.results.len(),
        summary.failures.len()
    );

    if !summary.failures.is_empty() {
        return Err(BenchmarkErrorKind::EnginesFailed {
            failed: summary.failures.len(),
            total: summary.results.len() + summary.failures.len(),
        }
        .into());
    }

    Ok(())
}

/// Measure every engine of the configured registry.
pub async fn run_session(config: &AppConfig, running: &Arc<AtomicBool>) -> Result<SessionSummary> {
    tracing::info!("Starting bench with config: {:?}", config.bench);

    let plan = config.bench.sample_plan()?;
    let platform = PlatformInfo::detect();

    if plan.threads > platform.logical_cores {
        tracing::warn!(
            "Running {} concurrent benches on {} logical cores, results will be oversubscribed",
            plan.threads,
            platform.logical_cores
        );
    }

    let registry = discovery::build_registry(&config.bench, &config.parser, &config.engines)?;
    let aggregator = Aggregator::new(plan);

    let mut results = Vec::new();
    let mut failures = Vec::new();

    for engine in registry.engines() {
        tracing::info!(
            "Benchmarking {} ({} sets of {} runs)",
            engine.name(),
            plan.sets,
            plan.threads
        );

        match aggregator.run(engine, running).await {
            Ok(result) => {
                tracing::info!("{}: {} nps (bench {})", result.engine, result.nps, result.bench);
                results.push(result);
            }
            Err(e) if matches!(e.kind(), BenchmarkErrorKind::Interrupted) => return Err(e),
            Err(e) => {
                tracing::error!("Skipping {}: {e}", engine.name());
                failures.push(EngineFailure {
                    engine: engine.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(SessionSummary {
        threads: plan.threads,
        sets: plan.sets,
        date: Local::now().date_naive().to_string(),
        platform,
        results,
        failures,
    })
}

/// Parse a saved bench log the way a live run would be parsed.
///
/// With an engine name, that engine's configured patterns are used.
pub fn parse_log(config: &AppConfig, log_file: &Path, engine: Option<&str>) -> Result<Sample> {
    let log = std::fs::read(log_file)?;
    let parser = discovery::parser_for(engine, &config.parser, &config.engines)?;

    Ok(parser.parse(&String::from_utf8_lossy(&log)))
}

pub fn format_result_line(result: &BenchmarkResult) -> String {
    format!("{:<15} | {}", result.engine, result.nps)
}
