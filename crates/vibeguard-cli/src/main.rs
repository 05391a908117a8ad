//! VibeGuard - declarative quality-check runner CLI
//!
//! ## Commands
//!
//! - `check`: execute all or named checks and report violations
//! - `validate`: load-and-validate the configuration
//! - `list`: enumerate configured checks
//! - `tags`: emit the unique sorted tag set
//!
//! Exit codes: 0 on success, 2 on configuration errors, and a configurable
//! code (default 1) when an error-severity check fails or times out.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

use vibeguard_core::{
    init_tracing, load_discovered, render_text, ConfigError, JsonReport, RunOptions,
    CONFIG_ERROR_EXIT_CODE, DEFAULT_ERROR_EXIT_CODE, VERSION,
};

#[derive(Parser)]
#[command(name = "vibeguard")]
#[command(version = VERSION)]
#[command(about = "Policy-enforcement runner for declarative quality checks", long_about = None)]
struct Cli {
    /// Path to the config file (default: discover vibeguard.yaml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute all checks, or only the named ones (plus their requires)
    Check {
        /// Check ids to run (default: all)
        ids: Vec<String>,

        /// Print every result, not just violations
        #[arg(short, long)]
        verbose: bool,

        /// Emit the machine-readable JSON report
        #[arg(long)]
        json: bool,

        /// Maximum number of checks running at once
        #[arg(short, long, env = "VIBEGUARD_PARALLEL")]
        parallel: Option<usize>,

        /// Cancel all remaining work on the first error-severity failure
        #[arg(long)]
        fail_fast: bool,

        /// Write per-check logs (<id>.log) under this directory
        #[arg(long, env = "VIBEGUARD_LOG_DIR")]
        log_dir: Option<PathBuf>,

        /// Exit code to use when an error-severity check fails
        #[arg(long, default_value_t = DEFAULT_ERROR_EXIT_CODE)]
        error_exit_code: i32,

        /// Only run checks carrying at least one of these tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Never run checks carrying any of these tags
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,
    },

    /// Load and validate the configuration, then exit
    Validate,

    /// Enumerate configured checks
    List,

    /// Emit the unique sorted set of tags
    Tags,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, Level::WARN);
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = match load_discovered(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return Ok(config_error(&err)),
    };
    debug!(path = %config.path.display(), checks = config.checks.len(), "config loaded");

    match cli.command {
        Commands::Validate => {
            println!(
                "{}: ok ({} checks)",
                config.path.display(),
                config.checks.len()
            );
            Ok(0)
        }

        Commands::List => {
            for check in &config.checks {
                let mut line = format!("{} [{}]", check.id, check.severity);
                if !check.requires.is_empty() {
                    line.push_str(&format!(" requires: {}", check.requires.join(", ")));
                }
                if !check.tags.is_empty() {
                    line.push_str(&format!(" tags: {}", check.tags.join(", ")));
                }
                println!("{line}");
            }
            Ok(0)
        }

        Commands::Tags => {
            for tag in config.all_tags() {
                println!("{tag}");
            }
            Ok(0)
        }

        Commands::Check {
            ids,
            verbose,
            json,
            parallel,
            fail_fast,
            log_dir,
            error_exit_code,
            tags,
            exclude_tags,
        } => {
            let options = RunOptions {
                parallel: parallel.unwrap_or_else(|| RunOptions::default().parallel),
                fail_fast,
                subset: if ids.is_empty() { None } else { Some(ids) },
                tags,
                exclude_tags,
                log_dir,
                error_exit_code,
            };

            let config = Arc::new(config);
            let cancel = CancellationToken::new();
            spawn_sigint_handler(cancel.clone());

            let run = match vibeguard_core::run_checks_with_cancel(
                Arc::clone(&config),
                options,
                cancel,
            )
            .await
            {
                Ok(run) => run,
                Err(err) => {
                    eprintln!("error: {err}");
                    return Ok(CONFIG_ERROR_EXIT_CODE);
                }
            };

            if json {
                let text = JsonReport::new(&config, &run)
                    .to_json()
                    .context("cannot serialize report")?;
                println!("{text}");
            } else {
                print!("{}", render_text(&run, verbose));
            }

            Ok(run.exit_code)
        }
    }
}

fn config_error(err: &ConfigError) -> i32 {
    eprintln!("config error [{}]: {err}", err.kind());
    CONFIG_ERROR_EXIT_CODE
}

/// First Ctrl-C cancels the run gracefully; the scheduler still drains
/// workers and reports cancelled checks.
fn spawn_sigint_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}
