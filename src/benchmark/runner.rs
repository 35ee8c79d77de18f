//! Running concurrent sample sets against an engine and reducing them to one NPS value.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::benchmark::parser::Sample;
use crate::core::Result;
use crate::core::config::SamplePlan;
use crate::core::engine::{EngineBinary, EngineExecutor};
use crate::core::error::{BenchmarkError, BenchmarkErrorKind, SampleField};
use crate::core::format_duration;

/// The calibrated speed of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub engine: String,
    /// The node count every run agreed on.
    pub bench: u64,
    /// Mean nodes per second over every sample.
    pub nps: u64,
    pub samples: usize,
}

/// Runs one batch of concurrent bench processes.
#[derive(Debug, Clone)]
pub struct SampleDriver {
    executor: EngineExecutor,
}

impl SampleDriver {
    pub fn new(executor: EngineExecutor) -> Self {
        Self { executor }
    }

    /// Start `threads` bench runs together and wait for every one of them.
    ///
    /// Returns exactly `threads` samples, in completion order. If any run
    /// fails, the rest of the batch is still waited for before the first
    /// error is returned.
    pub async fn run_set(&self, engine: &EngineBinary, threads: usize) -> Result<Vec<Sample>> {
        let (tx, mut rx) = mpsc::channel(threads.max(1));

        for worker in 0..threads {
            let tx = tx.clone();
            let executor = self.executor.clone();
            let engine = engine.clone();

            tokio::spawn(async move {
                let result = executor.sample(&engine).await;
                // Only fails if the driver itself went away
                let _ = tx.send((worker, result)).await;
            });
        }
        drop(tx);

        let mut samples = Vec::with_capacity(threads);
        let mut first_error: Option<BenchmarkError> = None;
        let mut received = 0;

        while let Some((worker, result)) = rx.recv().await {
            received += 1;
            match result {
                Ok(sample) => {
                    tracing::debug!("{} worker {worker}: {sample:?}", engine.name());
                    samples.push(sample);
                }
                Err(e) => {
                    tracing::warn!("{} worker {worker} failed: {e}", engine.name());
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if received != threads {
            return Err(BenchmarkErrorKind::IncompleteBatch {
                engine: engine.name().to_string(),
                expected: threads,
                received,
            }
            .into());
        }

        Ok(samples)
    }
}

/// Repeats sample sets and validates them into a [`BenchmarkResult`].
pub struct Aggregator {
    driver: SampleDriver,
    plan: SamplePlan,
}

impl Aggregator {
    pub fn new(plan: SamplePlan) -> Self {
        Self {
            driver: SampleDriver::new(EngineExecutor::new(plan.timeout)),
            plan,
        }
    }

    /// Run every sample set for one engine, one set after the other.
    pub async fn run(
        &self,
        engine: &EngineBinary,
        running: &Arc<AtomicBool>,
    ) -> Result<BenchmarkResult> {
        let start_time = Instant::now();
        let mut samples = Vec::with_capacity(self.plan.total_samples());

        let progress = ProgressBar::new(self.plan.sets as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("=="),
        );
        progress.enable_steady_tick(Duration::from_millis(100));
        progress.set_message(engine.name().to_string());

        for set_index in 0..self.plan.sets {
            if !running.load(Ordering::SeqCst) {
                progress.abandon_with_message(format!("{} interrupted", engine.name()));
                return Err(BenchmarkErrorKind::Interrupted.into());
            }

            let batch = match self.driver.run_set(engine, self.plan.threads).await {
                Ok(batch) => batch,
                Err(e) => {
                    progress.abandon_with_message(format!("{} failed", engine.name()));
                    return Err(e);
                }
            };
            samples.extend(batch);

            progress.set_position(set_index as u64 + 1);
            if set_index + 1 < self.plan.sets {
                let elapsed = start_time.elapsed();
                let remaining = elapsed / (set_index as u32 + 1)
                    * (self.plan.sets - set_index - 1) as u32;
                progress.set_message(format!(
                    "{} [ETA: {}]",
                    engine.name(),
                    format_duration(remaining)
                ));
            }
        }

        progress.finish_and_clear();

        let result = reduce_samples(engine.name(), &samples)?;
        tracing::debug!(
            "{} took {} for {} samples",
            engine.name(),
            format_duration(start_time.elapsed()),
            result.samples
        );

        Ok(result)
    }
}

/// Check that every sample agrees on the node count and average the speeds.
pub fn reduce_samples(engine: &str, samples: &[Sample]) -> Result<BenchmarkResult> {
    let counts: BTreeSet<u64> = samples.iter().filter_map(|sample| sample.bench).collect();
    if counts.len() > 1 {
        return Err(BenchmarkErrorKind::NonDeterminism {
            engine: engine.to_string(),
            counts: counts.into_iter().collect(),
        }
        .into());
    }

    let incomplete = |field: SampleField| -> BenchmarkError {
        BenchmarkErrorKind::IncompleteSample {
            engine: engine.to_string(),
            field,
        }
        .into()
    };

    let bench = match counts.first() {
        Some(&bench) if samples.iter().all(|sample| sample.bench.is_some()) => bench,
        _ => return Err(incomplete(SampleField::Bench)),
    };

    let speeds = samples
        .iter()
        .map(|sample| sample.nps.ok_or_else(|| incomplete(SampleField::Nps)))
        .collect::<Result<Vec<u64>>>()?;

    let total: u128 = speeds.iter().map(|&nps| u128::from(nps)).sum();
    let nps = (total / speeds.len() as u128) as u64;

    Ok(BenchmarkResult {
        engine: engine.to_string(),
        bench,
        nps,
        samples: samples.len(),
    })
}
