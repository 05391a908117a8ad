//! Grok pattern extraction.
//!
//! A grok pattern is a regular expression with semantic aliases of the form
//! `%{NAME:binding}` that desugar into named capture groups. Patterns are
//! compiled at config load time and run against check output (stdout, or the
//! declared `file` contents) to produce a string-keyed extraction map that
//! feeds assertion evaluation and message rendering.

use std::collections::HashMap;

use regex::Regex;

/// Semantic aliases and the regex fragments they expand to.
///
/// The fragment must be safe to wrap in a capture group.
const ALIASES: &[(&str, &str)] = &[
    ("NUMBER", r"[+-]?(?:\d+(?:\.\d+)?|\.\d+)"),
    ("INT", r"[+-]?\d+"),
    ("WORD", r"\w+"),
    ("GREEDYDATA", r".*"),
    ("IP", r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}"),
    ("QUOTEDSTRING", r#""[^"]*"|'[^']*'"#),
    (
        "TIMESTAMP_ISO8601",
        r"\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?",
    ),
];

fn alias_fragment(name: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, fragment)| *fragment)
}

/// A single compiled grok pattern.
#[derive(Debug, Clone)]
pub struct GrokPattern {
    source: String,
    regex: Regex,
}

impl GrokPattern {
    /// Compile a grok pattern, desugaring `%{ALIAS:binding}` references.
    ///
    /// Native named captures (`(?P<name>…)`) pass through untouched. Returns
    /// a message describing the failure when the alias is unknown, a binding
    /// name is invalid, or the expanded regex does not compile.
    pub fn compile(pattern: &str) -> Result<Self, String> {
        let expanded = expand_aliases(pattern)?;
        let regex = Regex::new(&expanded).map_err(|e| e.to_string())?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written in the config.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Extract the first match of this pattern from `input` into `out`,
    /// overwriting existing bindings with the same name.
    ///
    /// No match extracts nothing; whether that fails the check is the
    /// assertion's decision, not the extractor's.
    pub fn extract_into(&self, input: &str, out: &mut HashMap<String, String>) {
        let Some(captures) = self.regex.captures(input) else {
            return;
        };
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                out.insert(name.to_string(), m.as_str().to_string());
            }
        }
    }
}

impl serde::Serialize for GrokPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Run a pattern sequence in declaration order against `input`.
pub fn extract_all(patterns: &[GrokPattern], input: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pattern in patterns {
        pattern.extract_into(input, &mut out);
    }
    out
}

/// Rewrite `%{ALIAS:binding}` (and bare `%{ALIAS}`) into regex syntax.
fn expand_aliases(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unclosed %{{ reference in {:?}", pattern));
        };
        let body = &after[..end];

        let (alias, binding) = match body.split_once(':') {
            Some((alias, binding)) => (alias, Some(binding)),
            None => (body, None),
        };

        let fragment = alias_fragment(alias)
            .ok_or_else(|| format!("unknown grok alias {:?}", alias))?;

        match binding {
            Some(name) => {
                if !is_valid_binding(name) {
                    return Err(format!("invalid capture name {:?}", name));
                }
                out.push_str("(?P<");
                out.push_str(name);
                out.push('>');
                out.push_str(fragment);
                out.push(')');
            }
            None => {
                out.push_str("(?:");
                out.push_str(fragment);
                out.push(')');
            }
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_valid_binding(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
