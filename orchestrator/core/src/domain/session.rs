// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Hierarchical Session Identity
//!
//! Every unit of delegated work runs under its own [`SessionId`]. Child ids are
//! derived from their parent with the layout
//!
//! ```text
//! <parent>--sub_<label>_<suffix>
//! ```
//!
//! so the parent segment can always be read back from a child. Nesting is
//! unbounded: a parent may itself be a derived id.
//!
//! Labels are sanitised so they can never contain the `--sub_` marker, and
//! suffixes never contain `_`, which keeps the last marker in the string the
//! boundary between parent and child.

use serde::{Deserialize, Serialize};
use std::fmt;

const CHILD_MARKER: &str = "--sub_";
const SUFFIX_LEN: usize = 8;
const GENERIC_LABEL: &str = "generic";
const PATH_HOSTILE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Opaque, immutable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a root session id (a run id or a caller's own session).
    pub fn root(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a child session id.
    ///
    /// Deterministic when `suffix` is supplied; otherwise a fresh random
    /// 8-character suffix is generated.
    pub fn derive(parent: &SessionId, label: &str, suffix: Option<&str>) -> Self {
        let label = sanitize_label(label);
        let suffix = match suffix {
            Some(s) => sanitize_suffix(s),
            None => random_suffix(),
        };
        Self(format!("{}{}{}_{}", parent.0, CHILD_MARKER, label, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent session, or `None` for a root id.
    pub fn parent(&self) -> Option<SessionId> {
        self.split()
            .map(|(parent, _, _)| SessionId(parent.to_string()))
    }

    /// Sanitised label of the worker this session was derived for.
    pub fn label(&self) -> Option<&str> {
        self.split().map(|(_, label, _)| label)
    }

    pub fn suffix(&self) -> Option<&str> {
        self.split().map(|(_, _, suffix)| suffix)
    }

    pub fn is_root(&self) -> bool {
        self.split().is_none()
    }

    /// Number of derivation steps between this id and its root.
    pub fn depth(&self) -> usize {
        self.0.matches(CHILD_MARKER).count()
    }

    /// True if `self` was derived (directly or transitively) from `ancestor`.
    pub fn descends_from(&self, ancestor: &SessionId) -> bool {
        let mut current = self.parent();
        while let Some(session) = current {
            if &session == ancestor {
                return true;
            }
            current = session.parent();
        }
        false
    }

    fn split(&self) -> Option<(&str, &str, &str)> {
        let (parent, tail) = self.0.rsplit_once(CHILD_MARKER)?;
        let (label, suffix) = tail.rsplit_once('_')?;
        Some((parent, label, suffix))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::root(value)
    }
}

fn sanitize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return GENERIC_LABEL.to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        let mapped = if c.is_whitespace() || PATH_HOSTILE.contains(&c) {
            '_'
        } else {
            c
        };
        // "--" would let a label forge the child marker.
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out
}

fn sanitize_suffix(suffix: &str) -> String {
    let cleaned: String = suffix
        .trim()
        .chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect();
    if cleaned.is_empty() {
        random_suffix()
    } else {
        cleaned
    }
}

fn random_suffix() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(SUFFIX_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_derive_layout_with_explicit_suffix() {
        let parent = SessionId::root("run-42");
        let child = SessionId::derive(&parent, "code reviewer", Some("abcd1234"));

        assert_eq!(child.as_str(), "run-42--sub_code_reviewer_abcd1234");
        assert_eq!(child.parent(), Some(parent));
        assert_eq!(child.label(), Some("code_reviewer"));
        assert_eq!(child.suffix(), Some("abcd1234"));
    }

    #[test]
    fn test_empty_label_becomes_generic() {
        let parent = SessionId::root("root");
        let child = SessionId::derive(&parent, "   ", Some("s1"));
        assert_eq!(child.as_str(), "root--sub_generic_s1");
    }

    #[test]
    fn test_random_suffix_is_eight_chars_and_unique() {
        let parent = SessionId::root("root");
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let child = SessionId::derive(&parent, "worker", None);
            assert_eq!(child.suffix().map(str::len), Some(SUFFIX_LEN));
            assert!(seen.insert(child));
        }
    }

    #[test]
    fn test_parent_recovered_for_hostile_inputs() {
        let parents = [
            "r1",
            "r1--sub_planner_0000aaaa",
            "weird_parent_with_underscores",
            "a--b--c",
            "",
        ];
        let labels = [
            "worker",
            "--sub_x",
            "a--sub_b_c",
            "tab\tsep",
            "x_y_z",
            "",
            "-",
            "path/like:label",
        ];
        let suffixes = [Some("abc"), Some("with_underscore"), Some("--sub_"), None];

        for p in parents {
            let parent = SessionId::root(p);
            for label in labels {
                for suffix in suffixes {
                    let child = SessionId::derive(&parent, label, suffix);
                    assert!(child.as_str().starts_with(&format!("{}--sub_", p)));
                    assert_eq!(child.parent(), Some(parent.clone()), "child {}", child);
                }
            }
        }
    }

    #[test]
    fn test_nested_derivation_tracks_depth_and_ancestry() {
        let root = SessionId::root("run-7");
        let planner = SessionId::derive(&root, "planner", Some("p"));
        let helper = SessionId::derive(&planner, "helper", Some("h"));

        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(planner.depth(), 1);
        assert_eq!(helper.depth(), 2);
        assert_eq!(helper.parent(), Some(planner.clone()));
        assert!(helper.descends_from(&root));
        assert!(!planner.descends_from(&helper));
    }
}
