//! Configuration data model.
//!
//! A [`Config`] is immutable after loading: the loader parses the YAML,
//! the validator runs the ordered validation pipeline, and config-var
//! interpolation plus assertion/grok compilation happen once up front. All
//! engine components share the result read-only behind an `Arc`.

mod interpolate;
mod loader;
mod validate;

pub use interpolate::{merge_env, render};
pub use loader::{discover, load, load_discovered, parse_str, CONFIG_ENV_VAR, DISCOVERY_FILES};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::expr::Program;
use crate::grok::GrokPattern;

/// The single recognized config file version.
pub const SUPPORTED_VERSION: &str = "1";

/// Default per-check timeout when the config does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Check severity. Errors gate the exit code and block dependents on
/// failure; warnings do neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated check.
///
/// String fields have already had config-var interpolation applied;
/// `assert` and `grok` are compiled. Extracted-value interpolation of
/// `suggestion`/`fix` happens at render time against the merged environment.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub run: String,
    pub severity: Severity,
    #[serde(serialize_with = "ser_timeout")]
    pub timeout: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grok: Vec<GrokPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assert: Option<Program>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<String>,
}

impl Check {
    /// Whether this check carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A fully loaded and validated configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub version: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    pub checks: Vec<Check>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub prompts: BTreeMap<String, String>,
    /// Source path, for diagnostics. Not part of the document.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Config {
    /// Index of a check by id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.checks.iter().position(|c| c.id == id)
    }

    /// Look up a check by id.
    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Unique tags across all checks, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .checks
            .iter()
            .flat_map(|c| c.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

fn ser_timeout<S: serde::Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*d).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_all_tags_sorted_unique() {
        let config = parse_str(
            r#"
version: "1"
checks:
  - id: a
    run: "true"
    tags: [lint, fast]
  - id: b
    run: "true"
    tags: [fast, security]
"#,
        )
        .unwrap();
        assert_eq!(config.all_tags(), vec!["fast", "lint", "security"]);
    }

    #[test]
    fn test_roundtrip_preserves_order_and_ids() {
        let config = parse_str(
            r#"
version: "1"
checks:
  - id: fmt
    run: "cargo fmt --check"
  - id: vet
    run: "cargo clippy"
    requires: [fmt]
  - id: test
    run: "cargo test"
    requires: [vet]
"#,
        )
        .unwrap();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let reparsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let ids: Vec<&str> = reparsed["checks"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["fmt", "vet", "test"]);
    }
}
