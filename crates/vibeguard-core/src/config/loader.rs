//! Configuration discovery and loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::validate;
use super::Config;
use crate::error::ConfigError;

/// Environment variable naming an explicit config path.
pub const CONFIG_ENV_VAR: &str = "VIBEGUARD_CONFIG";

/// Well-known file names probed in order when no path is given.
pub const DISCOVERY_FILES: [&str; 4] = [
    "vibeguard.yaml",
    "vibeguard.yml",
    ".vibeguard.yaml",
    ".vibeguard.yml",
];

/// Raw YAML document shape, prior to validation.
///
/// Unknown keys anywhere in the document are rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    pub version: String,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub checks: Vec<RawCheck>,
    #[serde(default)]
    pub prompts: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawCheck {
    pub id: String,
    pub run: String,
    // Severity and timeout stay as strings here so the validator can reject
    // them under their own error kinds instead of a generic YAML error.
    pub severity: Option<String>,
    pub timeout: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub grok: Vec<String>,
    #[serde(rename = "assert")]
    pub assertion: Option<String>,
    pub suggestion: Option<String>,
    pub fix: Option<String>,
    pub file: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

/// Resolve the config path: explicit flag, then `VIBEGUARD_CONFIG`, then the
/// well-known discovery list relative to the current directory.
pub fn discover(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    for candidate in DISCOVERY_FILES {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(ConfigError::NotFound(
        DISCOVERY_FILES.iter().map(|s| s.to_string()).collect(),
    ))
}

/// Load and validate the configuration at `path`.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "loading config");
    parse_with_path(&text, path)
}

/// Discover, then load.
pub fn load_discovered(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = discover(explicit)?;
    load(&path)
}

/// Parse and validate YAML text directly (tests and embedders).
pub fn parse_str(yaml: &str) -> Result<Config, ConfigError> {
    parse_with_path(yaml, Path::new("<inline>"))
}

fn parse_with_path(yaml: &str, path: &Path) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|err| ConfigError::Yaml {
        path: path.to_path_buf(),
        message: err.to_string(),
        location: err.location().map(|l| (l.line(), l.column())),
    })?;
    validate::build(raw, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_loads() {
        let config = parse_str(
            r#"
version: "1"
checks:
  - id: pass
    run: "true"
"#,
        )
        .unwrap();
        assert_eq!(config.checks.len(), 1);
        assert_eq!(config.checks[0].id, "pass");
        assert_eq!(config.checks[0].timeout, super::super::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_str(
            r#"
version: "1"
checks:
  - id: pass
    run: "true"
    shout: loudly
"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "unknown-field");
    }

    #[test]
    fn test_yaml_syntax_error_carries_location() {
        let err = parse_str("version: \"1\"\nchecks: [\n").unwrap_err();
        match err {
            ConfigError::Yaml { location, .. } => assert!(location.is_some()),
            other => panic!("expected yaml error, got {other:?}"),
        }
    }

    #[test]
    fn test_discover_prefers_explicit() {
        let path = discover(Some(Path::new("custom.yaml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom.yaml"));
    }

    #[test]
    fn test_discovery_files_order() {
        assert_eq!(
            DISCOVERY_FILES,
            [
                "vibeguard.yaml",
                "vibeguard.yml",
                ".vibeguard.yaml",
                ".vibeguard.yml"
            ]
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/vibeguard.yaml")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
