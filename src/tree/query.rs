//! Tag-path queries.
//!
//! A [`TagPath`] is a chain of steps separated by `>`: `"div>img"` matches an
//! `img` whose immediate parent is a `div`; `"table"` matches every `table`.
//! A step may carry one exact attribute predicate, `div[class=Top_Hidden]`.
//!
//! Match sets are recomputed on every call. Rewrite rules must re-query after
//! each mutation rather than hold on to an old result.

use super::{NodeId, Tree};
use crate::error::DocNormError;
use std::fmt;
use std::str::FromStr;

/// One step of a [`TagPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub attr: Option<(String, String)>,
}

impl Step {
    fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        let Some(el) = tree.element(id) else {
            return false;
        };
        if !el.name.eq_ignore_ascii_case(&self.name) {
            return false;
        }
        match &self.attr {
            Some((key, value)) => el.attrs.get(key) == Some(value.as_str()),
            None => true,
        }
    }
}

impl FromStr for Step {
    type Err = DocNormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DocNormError::InvalidConfig(format!("invalid tag path step '{s}'"));

        let (name, attr) = match s.split_once('[') {
            Some((name, rest)) => {
                let inner = rest.strip_suffix(']').ok_or_else(invalid)?;
                let (key, value) = inner.split_once('=').ok_or_else(invalid)?;
                let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
                (name.trim(), Some((key.trim().to_string(), value.to_string())))
            }
            None => (s, None),
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid());
        }

        Ok(Step {
            name: name.to_ascii_lowercase(),
            attr,
        })
    }
}

/// Ancestor→descendant chain of element steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    steps: Vec<Step>,
}

impl TagPath {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Does `id` end this path? The chain may not pass through `scope`.
    fn matches(&self, tree: &Tree, id: NodeId, scope: Option<NodeId>) -> bool {
        let mut cur = id;
        for (i, step) in self.steps.iter().rev().enumerate() {
            if i > 0 {
                match tree.parent(cur) {
                    Some(p) => cur = p,
                    None => return false,
                }
            }
            if Some(cur) == scope || !step.matches(tree, cur) {
                return false;
            }
        }
        true
    }
}

impl FromStr for TagPath {
    type Err = DocNormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split('>')
            .map(str::parse)
            .collect::<Result<Vec<Step>, _>>()?;
        Ok(TagPath { steps })
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(">")?;
            }
            f.write_str(&step.name)?;
            if let Some((k, v)) = &step.attr {
                write!(f, "[{k}={v}]")?;
            }
        }
        Ok(())
    }
}

impl Tree {
    /// Every attached node matching `path`, in document order.
    pub fn query(&self, path: &TagPath) -> Vec<NodeId> {
        self.descendants(self.document())
            .filter(|&id| path.matches(self, id, None))
            .collect()
    }

    /// First attached node matching `path`.
    pub fn query_first(&self, path: &TagPath) -> Option<NodeId> {
        self.descendants(self.document())
            .find(|&id| path.matches(self, id, None))
    }

    /// Matches lying strictly inside `scope`, chain included.
    pub fn query_within(&self, scope: NodeId, path: &TagPath) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|&id| path.matches(self, id, Some(scope)))
            .collect()
    }

    /// Shorthand for `!query_within(..).is_empty()` that stops at the first hit.
    pub fn has_within(&self, scope: NodeId, path: &TagPath) -> bool {
        self.descendants(scope)
            .any(|id| path.matches(self, id, Some(scope)))
    }
}
