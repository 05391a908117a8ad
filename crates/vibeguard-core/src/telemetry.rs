//! Tracing setup and span conventions for the engine.
//!
//! Two pieces live here: [`init_tracing`], called once by a binary to
//! install the global subscriber, and [`check_span`], the span a scheduler
//! worker enters for the lifetime of one check so that every event emitted
//! underneath — spawn, timeout, kill, classification — carries the check id
//! without each call site repeating it.

use tracing::{info_span, Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset: the vibeguard crates log at
/// the requested level, everything else stays at `warn` so dependency noise
/// never drowns check output.
fn default_directives(level: Level) -> String {
    format!("warn,vibeguard_core={level},vibeguard_cli={level},vibeguard={level}")
}

fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(default_directives(level))
}

/// Initialise the global tracing subscriber.
///
/// * `json` — emit newline-delimited JSON log lines instead of plain text.
/// * `level` — engine verbosity when `RUST_LOG` is not set; `RUST_LOG`
///   overrides the whole filter when present.
///
/// Logs go to stderr: stdout is reserved for reports, which must stay
/// parseable under `--json`. Calling this more than once is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

/// The span one scheduler worker holds while executing a check.
///
/// Instrumenting the worker future with this span tags every engine event
/// for that check (subprocess lifecycle, file reads, log writes,
/// classification) with the check's id.
pub fn check_span(check_id: &str) -> Span {
    info_span!("check", id = %check_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_quiet_dependencies() {
        let directives = default_directives(Level::DEBUG);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("vibeguard_core=DEBUG"));
    }

    #[test]
    fn test_check_span_is_named_for_the_check() {
        let span = check_span("coverage");
        // With no subscriber installed the span is disabled but still
        // carries its metadata.
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "check");
        }
    }
}
