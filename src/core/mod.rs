pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod platform;
pub mod utils;

pub use config::{AppConfig, GlobalConfig};
pub use engine::{EngineBinary, EngineExecutor};
pub use error::{BenchmarkError, Result};
pub use utils::{format_duration, is_executable};
