//! Main binary entrypoint for benchnps.
//!
//! Parses CLI arguments, layers the configuration, sets up logging, and
//! dispatches to subcommands.

use benchnps::{
    AppConfig, BenchmarkErrorKind, Result, benchmark,
    core::config::{
        BenchOverrides, create_figment, create_figment_from_file, default_config_path,
        merge_cli_overrides,
    },
};
use clap::{Parser, Subcommand};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[derive(Parser)]
#[command(name = "benchnps")]
#[command(about = "Chess engine bench calibration tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Config file (default: <config dir>/benchnps/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every engine's bench concurrently and report its mean NPS
    Bench {
        #[arg(short = 'T', long, help = "Concurrent bench processes per sample set")]
        threads: Option<usize>,

        #[arg(short = 'S', long, help = "Number of sample sets")]
        sets: Option<usize>,

        #[arg(long)]
        binaries_dir: Option<PathBuf>,

        #[arg(long)]
        pattern: Option<String>,

        #[arg(long = "engine", help = "Only bench this engine (repeatable)")]
        engines: Vec<String>,

        #[arg(long, help = "Seconds a single bench run may take")]
        timeout: Option<u64>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse a saved bench log and print the node count and NPS found in it
    Parse {
        log_file: PathBuf,

        #[arg(long, help = "Use this engine's configured output patterns")]
        engine: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let figment = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(BenchmarkErrorKind::InvalidSetting {
                name: "config",
                reason: format!("{} does not exist", path.display()),
            }
            .into());
        }
        Some(path) => create_figment_from_file(path)?,
        None => match default_config_path().filter(|path| path.is_file()) {
            Some(path) => create_figment_from_file(&path)?,
            None => create_figment(),
        },
    };

    let overrides = match &cli.command {
        Commands::Bench {
            threads,
            sets,
            binaries_dir,
            pattern,
            engines,
            timeout,
            output,
        } => BenchOverrides {
            threads: *threads,
            sets: *sets,
            binaries_dir: binaries_dir.clone(),
            pattern: pattern.clone(),
            engines: engines.clone(),
            timeout_secs: *timeout,
            output: output.clone(),
        },
        Commands::Parse { .. } => BenchOverrides::default(),
    };

    let figment = merge_cli_overrides(figment, cli.verbose, &overrides);
    AppConfig::from_figment(&figment)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse input
    let cli = Cli::parse();
    let config = load_config(&cli);

    // Toggle the tracing level
    let verbose = match &config {
        Ok(config) => config.global.verbose,
        Err(_) => cli.verbose,
    };
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    // Listen to CTRL+C
    let needs_shutdown = matches!(cli.command, Commands::Bench { .. });
    let running = Arc::new(AtomicBool::new(true));
    let shutdown_task = if needs_shutdown {
        let r = running.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for CTRL+C: {e}");
            }
            tracing::info!("Received CTRL+C. Stopping after the current sample set...");
            r.store(false, Ordering::SeqCst);
        }))
    } else {
        None
    };

    let result = match (config, cli.command) {
        (Err(e), _) => Err(e),
        (Ok(config), Commands::Bench { .. }) => benchmark::run(config, &running).await,
        (Ok(config), Commands::Parse { log_file, engine }) => {
            benchmark::parse_log(&config, &log_file, engine.as_deref()).map(|sample| {
                let show = |value: Option<u64>| {
                    value.map_or_else(|| "not found".to_string(), |v| v.to_string())
                };
                println!("bench: {}", show(sample.bench));
                println!("nps:   {}", show(sample.nps));
            })
        }
    };

    // Await shutdown if needed
    if let Some(task) = shutdown_task {
        let interrupted = !running.load(Ordering::SeqCst);
        if interrupted {
            let _ = task.await;
            tracing::info!("Shutdown complete");
        } else {
            task.abort();
        }
    }

    // If any command results in an error, print and exit
    if let Err(e) = result {
        tracing::error!("{e}");

        std::process::exit(1);
    }

    Ok(())
}
