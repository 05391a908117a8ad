//! `{{.name}}` template interpolation.
//!
//! Two namespaces participate at different phases: config `vars` are
//! substituted into command/assert/suggestion/fix/file/grok fields at load
//! time; extracted values are substituted into suggestion/fix at render time
//! via [`merge_env`], where they override config vars on conflict.
//!
//! Undefined references are left as literal text. Optional extractions may
//! legitimately be absent and a half-rendered message beats a hard failure
//! in a CI pipeline.

use std::collections::{BTreeMap, HashMap};

/// Substitute `{{.name}}` references from `vars`, leaving unresolved
/// references untouched.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{.") {
        let after = &rest[start + 3..];
        let Some(end) = after.find("}}") else {
            // No closing braces: the remainder is literal.
            break;
        };
        let name = &after[..end];

        if is_var_name(name) {
            if let Some(value) = vars.get(name) {
                out.push_str(&rest[..start]);
                out.push_str(value);
                rest = &after[end + 2..];
                continue;
            }
        }

        // Undefined or malformed: keep the reference text verbatim and
        // continue scanning after it.
        out.push_str(&rest[..start + 3 + end + 2]);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Merge config vars and extracted values for render-time interpolation and
/// assertion evaluation. Extracted values win on conflict.
pub fn merge_env(
    config_vars: &BTreeMap<String, String>,
    extracted: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = config_vars
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (k, v) in extracted {
        env.insert(k.clone(), v.clone());
    }
    env
}

/// Variable names follow `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_substitution() {
        let v = vars(&[("min", "80")]);
        assert_eq!(render("cov >= {{.min}}", &v), "cov >= 80");
    }

    #[test]
    fn test_multiple_references() {
        let v = vars(&[("a", "1"), ("b", "2")]);
        assert_eq!(render("{{.a}}+{{.b}}={{.a}}{{.b}}", &v), "1+2=12");
    }

    #[test]
    fn test_undefined_left_literal() {
        let v = vars(&[("present", "yes")]);
        assert_eq!(
            render("{{.present}} and {{.absent}}", &v),
            "yes and {{.absent}}"
        );
    }

    #[test]
    fn test_unclosed_reference_left_literal() {
        let v = vars(&[("x", "1")]);
        assert_eq!(render("start {{.x", &v), "start {{.x");
    }

    #[test]
    fn test_malformed_name_left_literal() {
        let v = vars(&[("x", "1")]);
        assert_eq!(render("{{.9bad}}", &v), "{{.9bad}}");
    }

    #[test]
    fn test_no_references_passthrough() {
        assert_eq!(render("plain text", &vars(&[])), "plain text");
    }

    #[test]
    fn test_merge_extracted_wins() {
        let mut config_vars = BTreeMap::new();
        config_vars.insert("threshold".to_string(), "80".to_string());
        config_vars.insert("name".to_string(), "config".to_string());

        let extracted = vars(&[("name", "extracted"), ("cov", "92")]);

        let env = merge_env(&config_vars, &extracted);
        assert_eq!(env.get("name").map(String::as_str), Some("extracted"));
        assert_eq!(env.get("threshold").map(String::as_str), Some("80"));
        assert_eq!(env.get("cov").map(String::as_str), Some("92"));
    }

    #[test]
    fn test_var_name_format() {
        assert!(is_var_name("abc"));
        assert!(is_var_name("_private"));
        assert!(is_var_name("a1_b2"));
        assert!(!is_var_name(""));
        assert!(!is_var_name("9lives"));
        assert!(!is_var_name("with-dash"));
    }
}
