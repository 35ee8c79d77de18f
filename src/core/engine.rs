//! The wrapper for running an engine binary's built-in bench.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
};

use crate::{
    benchmark::parser::{OutputParser, Sample},
    core::{
        Result,
        error::{BenchmarkError, BenchmarkErrorKind},
    },
};

/// The argument every engine accepts to run its fixed search workload.
pub const BENCH_ARG: &str = "bench";

/// A named, already built engine executable along with the parser for its output.
#[derive(Debug, Clone)]
pub struct EngineBinary {
    name: String,
    path: PathBuf,
    parser: Arc<OutputParser>,
}

impl EngineBinary {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, parser: Arc<OutputParser>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parser,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parser(&self) -> &OutputParser {
        &self.parser
    }
}

/// Both output streams of one bench run, kept apart.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    /// Parse stdout, and fall back to stderr when stdout is missing either
    /// field. The stderr result replaces the stdout one as a whole.
    pub fn parse_with(&self, parser: &OutputParser) -> Sample {
        let sample = parser.parse(&self.stdout);
        if sample.is_complete() {
            return sample;
        }

        tracing::debug!("Incomplete bench output on stdout ({sample:?}), trying stderr");
        parser.parse(&self.stderr)
    }
}

/// Runs single bench invocations, each bounded by a timeout.
#[derive(Debug, Clone)]
pub struct EngineExecutor {
    timeout: Duration,
}

impl EngineExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `<engine> bench` with stdin closed and both output streams piped.
    /// The child is killed if its handle is dropped before it exits.
    pub fn create_command(&self, engine: &EngineBinary) -> Command {
        let mut cmd = Command::new(engine.path());
        cmd.arg(BENCH_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one bench and parse it into a sample.
    pub async fn sample(&self, engine: &EngineBinary) -> Result<Sample> {
        let output = self.run_bench(engine).await?;
        Ok(output.parse_with(engine.parser()))
    }

    /// Run `<engine> bench` to completion and collect both output streams.
    ///
    /// The child is always reaped before this returns: on timeout or a
    /// failed read it is killed and waited for.
    pub async fn run_bench(&self, engine: &EngineBinary) -> Result<RawOutput> {
        let mut cmd = self.create_command(engine);

        tracing::debug!("Running {} {}", engine.path().display(), BENCH_ARG);

        let mut child = cmd
            .spawn()
            .map_err(|source| BenchmarkErrorKind::EngineSpawnFailed {
                engine: engine.name().to_string(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout of engine was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr of engine was not captured"))?;

        let collected = tokio::time::timeout(self.timeout, async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, _, _) = tokio::try_join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err)
            )?;
            Ok::<_, io::Error>((status, out, err))
        })
        .await;

        let (status, out, err) = match collected {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Lost the output of {}: {e}", engine.name());
                reap(&mut child, engine.name()).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(
                    "{} did not finish within {}s, killing it",
                    engine.name(),
                    self.timeout.as_secs()
                );
                reap(&mut child, engine.name()).await;
                return Err(BenchmarkErrorKind::EngineTimedOut {
                    engine: engine.name().to_string(),
                    timeout: self.timeout,
                }
                .into());
            }
        };

        let output = RawOutput {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        };

        tracing::debug!("{} exited with: {status}", engine.name());

        if !status.success() {
            tracing::debug!("Out: {}", output.stdout);
            tracing::debug!("Err: {}", output.stderr);

            let hint = output
                .stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| format!("last stderr line: {}", line.trim()));

            return Err(
                BenchmarkError::from(BenchmarkErrorKind::EngineProcessFailed {
                    engine: engine.name().to_string(),
                    code: status.code().unwrap_or(-1),
                })
                .with_hint(hint),
            );
        }

        Ok(output)
    }
}

/// Kill the child and wait for its exit status.
async fn reap(child: &mut Child, name: &str) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill {name}: {e}");
    }
}
