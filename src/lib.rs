pub mod benchmark;
pub mod core;

pub use benchmark::runner::BenchmarkResult;
pub use core::AppConfig;
pub use core::error::{BenchmarkError, BenchmarkErrorKind, Result};
