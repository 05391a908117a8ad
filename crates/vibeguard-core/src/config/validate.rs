//! The ordered validation pipeline.
//!
//! Fail fast, first error wins, in this order: version → var names → id
//! format & uniqueness (and non-empty command) → severity → timeout →
//! `requires` references → acyclicity → assertion parse → grok compile →
//! tag format → prompt references. Config-var interpolation runs between
//! the graph checks and expression compilation so that interpolated
//! assertions and patterns are what actually gets compiled.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::interpolate::{is_var_name, render};
use super::loader::RawConfig;
use super::{Check, Config, Severity, DEFAULT_TIMEOUT, SUPPORTED_VERSION};
use crate::error::ConfigError;
use crate::expr::Program;
use crate::grok::GrokPattern;

pub(super) fn build(raw: RawConfig, path: &Path) -> Result<Config, ConfigError> {
    if raw.version != SUPPORTED_VERSION {
        return Err(ConfigError::UnsupportedVersion { found: raw.version });
    }

    for name in raw.vars.keys() {
        if !is_var_name(name) {
            return Err(ConfigError::BadVarName { name: name.clone() });
        }
    }

    // id format, uniqueness, non-empty command
    let mut seen = HashSet::new();
    for (index, check) in raw.checks.iter().enumerate() {
        if !is_check_id(&check.id) {
            return Err(ConfigError::BadCheckId {
                index,
                id: check.id.clone(),
            });
        }
        if !seen.insert(check.id.as_str()) {
            return Err(ConfigError::DuplicateId {
                id: check.id.clone(),
            });
        }
        if check.run.trim().is_empty() {
            return Err(ConfigError::EmptyCommand {
                id: check.id.clone(),
            });
        }
    }

    let severities = raw
        .checks
        .iter()
        .map(|check| parse_severity(&check.id, check.severity.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    let timeouts = raw
        .checks
        .iter()
        .map(|check| parse_timeout(&check.id, check.timeout.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    // requires targets exist
    let index_of: HashMap<&str, usize> = raw
        .checks
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();
    let mut requires_idx: Vec<Vec<usize>> = Vec::with_capacity(raw.checks.len());
    for check in &raw.checks {
        let mut targets = Vec::with_capacity(check.requires.len());
        for target in &check.requires {
            match index_of.get(target.as_str()) {
                Some(&i) => targets.push(i),
                None => {
                    return Err(ConfigError::UnknownRequires {
                        id: check.id.clone(),
                        target: target.clone(),
                    })
                }
            }
        }
        requires_idx.push(targets);
    }

    let ids: Vec<&str> = raw.checks.iter().map(|c| c.id.as_str()).collect();
    check_acyclic(&ids, &requires_idx)?;

    // Load-time interpolation of config vars, then expression/pattern
    // compilation over the interpolated text.
    let vars: HashMap<String, String> = raw
        .vars
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut checks = Vec::with_capacity(raw.checks.len());
    for ((check, severity), timeout) in raw.checks.iter().zip(severities).zip(timeouts) {
        let assert = match &check.assertion {
            Some(src) => {
                let rendered = render(src, &vars);
                Some(
                    Program::parse(&rendered).map_err(|e| ConfigError::BadAssert {
                        id: check.id.clone(),
                        message: e.to_string(),
                    })?,
                )
            }
            None => None,
        };

        let mut grok = Vec::with_capacity(check.grok.len());
        for pattern in &check.grok {
            let rendered = render(pattern, &vars);
            grok.push(
                GrokPattern::compile(&rendered).map_err(|message| ConfigError::BadGrok {
                    id: check.id.clone(),
                    pattern: pattern.clone(),
                    message,
                })?,
            );
        }

        checks.push(Check {
            id: check.id.clone(),
            run: render(&check.run, &vars),
            severity,
            timeout,
            requires: check.requires.clone(),
            grok,
            assert,
            suggestion: check.suggestion.as_deref().map(|s| render(s, &vars)),
            fix: check.fix.as_deref().map(|s| render(s, &vars)),
            file: check.file.as_deref().map(|f| PathBuf::from(render(f, &vars))),
            tags: check.tags.clone(),
            prompts: check.prompts.clone(),
        });
    }

    for check in &checks {
        for tag in &check.tags {
            if !is_tag(tag) {
                return Err(ConfigError::BadTag {
                    id: check.id.clone(),
                    tag: tag.clone(),
                });
            }
        }
    }

    for check in &checks {
        for prompt in &check.prompts {
            if !raw.prompts.contains_key(prompt) {
                return Err(ConfigError::UnknownPrompt {
                    id: check.id.clone(),
                    prompt: prompt.clone(),
                });
            }
        }
    }

    Ok(Config {
        version: raw.version,
        vars: raw.vars,
        checks,
        prompts: raw.prompts,
        path: path.to_path_buf(),
    })
}

/// Check ids follow `^[A-Za-z_][A-Za-z0-9_-]*$`.
fn is_check_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Tags follow `^[a-z][a-z0-9-]*$`.
fn is_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn parse_severity(id: &str, value: Option<&str>) -> Result<Severity, ConfigError> {
    match value {
        None => Ok(Severity::Error),
        Some("error") => Ok(Severity::Error),
        Some("warning") => Ok(Severity::Warning),
        Some(other) => Err(ConfigError::BadSeverity {
            id: id.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_timeout(id: &str, value: Option<&str>) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(DEFAULT_TIMEOUT),
        Some(text) => {
            let duration = humantime::parse_duration(text).map_err(|_| ConfigError::BadTimeout {
                id: id.to_string(),
                value: text.to_string(),
            })?;
            if duration.is_zero() {
                return Err(ConfigError::BadTimeout {
                    id: id.to_string(),
                    value: text.to_string(),
                });
            }
            Ok(duration)
        }
    }
}

/// Depth-first three-color cycle detection, reporting a cycle witness.
fn check_acyclic(ids: &[&str], requires: &[Vec<usize>]) -> Result<(), ConfigError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    fn visit(
        node: usize,
        ids: &[&str],
        requires: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), ConfigError> {
        marks[node] = Mark::Gray;
        path.push(node);
        for &next in &requires[node] {
            match marks[next] {
                Mark::Gray => {
                    // The gray node is on the current path: the witness is
                    // the path from its first occurrence back to itself.
                    let pos = path.iter().position(|&p| p == next).unwrap_or(0);
                    let witness = path[pos..]
                        .iter()
                        .map(|&i| ids[i].to_string())
                        .chain(std::iter::once(ids[next].to_string()))
                        .collect();
                    return Err(ConfigError::Cycle { witness });
                }
                Mark::White => visit(next, ids, requires, marks, path)?,
                Mark::Black => {}
            }
        }
        path.pop();
        marks[node] = Mark::Black;
        Ok(())
    }

    let mut marks = vec![Mark::White; ids.len()];
    let mut path = Vec::new();
    for start in 0..ids.len() {
        if marks[start] == Mark::White {
            visit(start, ids, requires, &mut marks, &mut path)?;
        }
    }
    Ok(())
}
