//! Dependency graph over check indices.
//!
//! Checks are addressed by their position in the config's declaration order
//! (arena-style), so scheduler workers share plain index vectors instead of
//! locking name maps. The graph is built after validation: every `requires`
//! target is known to exist and the edge set is acyclic.

use std::collections::HashMap;

use crate::config::Config;
use crate::error::EngineError;

/// Adjacency view of the `requires` relation.
#[derive(Debug)]
pub struct CheckGraph {
    /// `requires[i]` — indices check `i` depends on.
    requires: Vec<Vec<usize>>,
    /// `dependents[i]` — indices that depend on check `i`.
    dependents: Vec<Vec<usize>>,
}

impl CheckGraph {
    /// Build the adjacency lists from a validated config.
    pub fn new(config: &Config) -> Self {
        let index_of: HashMap<&str, usize> = config
            .checks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.as_str(), i))
            .collect();

        let mut requires = vec![Vec::new(); config.checks.len()];
        let mut dependents = vec![Vec::new(); config.checks.len()];

        for (i, check) in config.checks.iter().enumerate() {
            for target in &check.requires {
                // Validation guarantees the target exists.
                if let Some(&t) = index_of.get(target.as_str()) {
                    requires[i].push(t);
                    dependents[t].push(i);
                }
            }
        }

        Self {
            requires,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    pub fn requires_of(&self, i: usize) -> &[usize] {
        &self.requires[i]
    }

    pub fn dependents_of(&self, i: usize) -> &[usize] {
        &self.dependents[i]
    }

    /// Expand a requested id subset to include all transitive `requires`.
    ///
    /// Returns a membership mask over check indices.
    pub fn subset_closure(
        &self,
        config: &Config,
        ids: &[String],
    ) -> Result<Vec<bool>, EngineError> {
        let mut selected = vec![false; self.len()];
        let mut stack = Vec::new();

        for id in ids {
            let idx = config
                .index_of(id)
                .ok_or_else(|| EngineError::UnknownCheck(id.clone()))?;
            stack.push(idx);
        }

        while let Some(idx) = stack.pop() {
            if selected[idx] {
                continue;
            }
            selected[idx] = true;
            stack.extend_from_slice(&self.requires[idx]);
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_str;

    fn fixture() -> Config {
        parse_str(
            r#"
version: "1"
checks:
  - id: fmt
    run: "true"
  - id: vet
    run: "true"
    requires: [fmt]
  - id: test
    run: "true"
    requires: [vet]
  - id: lonely
    run: "true"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_adjacency() {
        let config = fixture();
        let graph = CheckGraph::new(&config);
        assert_eq!(graph.requires_of(0), &[] as &[usize]);
        assert_eq!(graph.requires_of(1), &[0]);
        assert_eq!(graph.requires_of(2), &[1]);
        assert_eq!(graph.dependents_of(0), &[1]);
        assert_eq!(graph.dependents_of(1), &[2]);
        assert_eq!(graph.dependents_of(3), &[] as &[usize]);
    }

    #[test]
    fn test_subset_closure_pulls_transitive_requires() {
        let config = fixture();
        let graph = CheckGraph::new(&config);
        let selected = graph
            .subset_closure(&config, &["test".to_string()])
            .unwrap();
        assert_eq!(selected, vec![true, true, true, false]);
    }

    #[test]
    fn test_subset_closure_unknown_id() {
        let config = fixture();
        let graph = CheckGraph::new(&config);
        let err = graph
            .subset_closure(&config, &["phantom".to_string()])
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownCheck(_)));
    }
}
