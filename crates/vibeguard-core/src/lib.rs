//! VibeGuard Core Library
//!
//! The execution engine behind the `vibeguard` CLI: declarative YAML checks
//! run as a dependency-aware parallel pipeline, with grok extraction and
//! assertion evaluation deciding pass/fail and violations aggregated into a
//! single run result.

pub mod config;
pub mod error;
pub mod exec;
pub mod expr;
pub mod graph;
pub mod grok;
pub mod outcome;
pub mod report;
pub mod schedule;
pub mod telemetry;

pub use config::{
    discover, load, load_discovered, parse_str, Check, Config, Severity, CONFIG_ENV_VAR,
    DEFAULT_TIMEOUT, DISCOVERY_FILES, SUPPORTED_VERSION,
};

pub use error::{ConfigError, EngineError};

pub use expr::{ExprError, Program, Value};

pub use grok::{extract_all, GrokPattern};

pub use outcome::{CheckResult, CheckStatus, ExecutionResult, RunResult, Violation};

pub use report::{render_text, JsonReport};

pub use schedule::{
    run_checks, run_checks_with_cancel, RunOptions, DEFAULT_ERROR_EXIT_CODE,
};

pub use telemetry::{check_span, init_tracing};

/// Exit code for configuration errors.
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;

/// VibeGuard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
