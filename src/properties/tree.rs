//! Nested parameter tree built from `dotted.key=value` header files

use crate::{JpkError, Result};
use std::collections::BTreeMap;
use std::str::FromStr;

/// One node of a [`ParameterTree`]: a scalar text value or a nested tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyNode {
    Scalar(String),
    Subtree(ParameterTree),
}

impl PropertyNode {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            PropertyNode::Scalar(value) => Some(value),
            PropertyNode::Subtree(_) => None,
        }
    }

    pub fn as_subtree(&self) -> Option<&ParameterTree> {
        match self {
            PropertyNode::Scalar(_) => None,
            PropertyNode::Subtree(tree) => Some(tree),
        }
    }
}

/// Mapping from key to [`PropertyNode`]
///
/// Paths are addressed with dots (`channel.height.data.type`), mirroring the
/// keys of the property file the tree was parsed from. Keys are kept sorted so
/// enumeration is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTree {
    entries: BTreeMap<String, PropertyNode>,
}

impl ParameterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Direct child by key (no dot splitting)
    pub fn child(&self, key: &str) -> Option<&PropertyNode> {
        self.entries.get(key)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut PropertyNode> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: PropertyNode) -> Option<PropertyNode> {
        self.entries.insert(key.into(), node)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyNode> {
        self.entries.remove(key)
    }

    /// Look up a node by dotted path
    pub fn get(&self, path: &str) -> Option<&PropertyNode> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        parts.try_fold(self.entries.get(first)?, |node, key| {
            node.as_subtree()?.entries.get(key)
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn find_scalar(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(PropertyNode::as_scalar)
    }

    pub fn find_subtree(&self, path: &str) -> Option<&ParameterTree> {
        self.get(path).and_then(PropertyNode::as_subtree)
    }

    /// Scalar at `path`, failing if it is absent or a subtree
    pub fn scalar(&self, path: &str) -> Result<&str> {
        match self.get(path) {
            Some(PropertyNode::Scalar(value)) => Ok(value),
            Some(PropertyNode::Subtree(_)) => Err(JpkError::UnexpectedNode {
                path: path.to_string(),
                expected: "value",
            }),
            None => Err(JpkError::MissingParameter(path.to_string())),
        }
    }

    /// Subtree at `path`, failing if it is absent or a scalar
    pub fn subtree(&self, path: &str) -> Result<&ParameterTree> {
        match self.get(path) {
            Some(PropertyNode::Subtree(tree)) => Ok(tree),
            Some(PropertyNode::Scalar(_)) => Err(JpkError::UnexpectedNode {
                path: path.to_string(),
                expected: "subtree",
            }),
            None => Err(JpkError::MissingParameter(path.to_string())),
        }
    }

    /// Scalar at `path` parsed into `T`
    pub fn value<T: FromStr>(&self, path: &str) -> Result<T> {
        let raw = self.scalar(path)?;
        raw.trim().parse().map_err(|_| JpkError::InvalidValue {
            path: path.to_string(),
            value: raw.to_string(),
        })
    }

    /// Mutable subtree reached by following `path` key by key
    pub fn subtree_at_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut ParameterTree> {
        let mut node = self;
        for key in path {
            node = match node.entries.get_mut(key.as_ref())? {
                PropertyNode::Subtree(tree) => tree,
                PropertyNode::Scalar(_) => return None,
            };
        }
        Some(node)
    }

    /// Insert `value` at `path`, creating intermediate subtrees
    ///
    /// A later value for the same path replaces the earlier one. A path that
    /// runs through an existing scalar, or ends on an existing subtree, fails.
    pub fn insert_path(&mut self, path: &[&str], value: String) -> Result<()> {
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(());
        };

        let mut node = self;
        for (depth, key) in parents.iter().enumerate() {
            let entry = node
                .entries
                .entry((*key).to_string())
                .or_insert_with(|| PropertyNode::Subtree(ParameterTree::new()));
            node = match entry {
                PropertyNode::Subtree(tree) => tree,
                PropertyNode::Scalar(_) => {
                    return Err(JpkError::PropertyPathConflict {
                        path: path[..=depth].join("."),
                    });
                }
            };
        }

        if let Some(PropertyNode::Subtree(_)) = node.entries.get(*leaf) {
            return Err(JpkError::PropertyPathConflict {
                path: path.join("."),
            });
        }
        node.entries
            .insert((*leaf).to_string(), PropertyNode::Scalar(value));
        Ok(())
    }

    /// Deep-merge `source` into this tree
    ///
    /// Keys missing here are copied, subtrees present on both sides are merged
    /// recursively, equal scalars are left alone. Anything else is a conflict.
    pub fn merge(&mut self, source: &ParameterTree) -> Result<()> {
        self.merge_at(source, &mut Vec::new())
    }

    /// Like [`merge`](Self::merge), for a tree that sits at `prefix` inside a
    /// larger one; conflicts report the full path.
    pub(crate) fn merge_under(&mut self, source: &ParameterTree, prefix: &[String]) -> Result<()> {
        self.merge_at(source, &mut prefix.to_vec())
    }

    fn merge_at(&mut self, source: &ParameterTree, chain: &mut Vec<String>) -> Result<()> {
        for (key, incoming) in &source.entries {
            chain.push(key.clone());
            match (self.entries.get_mut(key), incoming) {
                (None, _) => {
                    self.entries.insert(key.clone(), incoming.clone());
                }
                (Some(PropertyNode::Subtree(existing)), PropertyNode::Subtree(incoming)) => {
                    existing.merge_at(incoming, chain)?;
                }
                (Some(PropertyNode::Scalar(existing)), PropertyNode::Scalar(incoming))
                    if existing.as_str() == incoming.as_str() => {}
                (Some(_), _) => {
                    return Err(JpkError::HeaderMergeConflict {
                        path: chain.join("."),
                    });
                }
            }
            chain.pop();
        }
        Ok(())
    }

    /// All scalar values keyed by their full dotted path
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        for (key, node) in &self.entries {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match node {
                PropertyNode::Scalar(value) => out.push((path, value.clone())),
                PropertyNode::Subtree(tree) => tree.flatten_into(&path, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(pairs: &[(&str, &str)]) -> ParameterTree {
        let mut t = ParameterTree::new();
        for (key, value) in pairs {
            let path: Vec<&str> = key.split('.').collect();
            t.insert_path(&path, value.to_string()).unwrap();
        }
        t
    }

    #[test]
    fn test_dotted_lookup() {
        let t = tree(&[("channel.height.data.type", "short"), ("a", "1")]);
        assert_eq!(t.find_scalar("channel.height.data.type"), Some("short"));
        assert!(t.find_subtree("channel.height").is_some());
        assert_eq!(t.find_scalar("a"), Some("1"));
        assert!(t.get("channel.depth").is_none());
        assert!(t.get("a.b").is_none());
    }

    #[test]
    fn test_typed_accessors_report_mismatch() {
        let t = tree(&[("segment.num-points", "12"), ("segment.style", "extend")]);

        assert_eq!(t.value::<usize>("segment.num-points").unwrap(), 12);
        assert!(matches!(
            t.scalar("segment"),
            Err(JpkError::UnexpectedNode { expected: "value", .. })
        ));
        assert!(matches!(
            t.subtree("segment.style"),
            Err(JpkError::UnexpectedNode { expected: "subtree", .. })
        ));
        assert!(matches!(
            t.scalar("segment.duration"),
            Err(JpkError::MissingParameter(p)) if p == "segment.duration"
        ));
        assert!(matches!(
            t.value::<f64>("segment.style"),
            Err(JpkError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_insert_path_conflict() {
        let mut t = tree(&[("a.b", "1")]);
        assert!(matches!(
            t.insert_path(&["a", "b", "c"], "2".to_string()),
            Err(JpkError::PropertyPathConflict { path }) if path == "a.b"
        ));
        assert!(matches!(
            t.insert_path(&["a"], "2".to_string()),
            Err(JpkError::PropertyPathConflict { .. })
        ));
        // Later scalar wins
        t.insert_path(&["a", "b"], "3".to_string()).unwrap();
        assert_eq!(t.find_scalar("a.b"), Some("3"));
    }

    #[test]
    fn test_merge_copies_and_recurses() {
        let mut dest = tree(&[("x.a", "1"), ("x.b", "2")]);
        let src = tree(&[("x.b", "2"), ("x.c", "3"), ("y", "4")]);
        dest.merge(&src).unwrap();
        assert_eq!(
            dest.flatten(),
            vec![
                ("x.a".to_string(), "1".to_string()),
                ("x.b".to_string(), "2".to_string()),
                ("x.c".to_string(), "3".to_string()),
                ("y".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_conflict_names_full_path() {
        let mut dest = tree(&[("x.scaling.offset", "0.0")]);
        let src = tree(&[("x.scaling.offset", "1.0")]);
        let err = dest.merge(&src).unwrap_err();
        assert!(matches!(
            err,
            JpkError::HeaderMergeConflict { ref path } if path == "x.scaling.offset"
        ));

        // Scalar against subtree is a conflict too
        let mut dest = tree(&[("x", "0")]);
        let src = tree(&[("x.y", "1")]);
        assert!(matches!(
            dest.merge(&src),
            Err(JpkError::HeaderMergeConflict { .. })
        ));
    }

    #[test]
    fn test_subtree_at_mut() {
        let mut t = tree(&[("a.b.c", "1")]);
        let sub = t.subtree_at_mut(&["a", "b"]).unwrap();
        sub.insert("d", PropertyNode::Scalar("2".to_string()));
        assert_eq!(t.find_scalar("a.b.d"), Some("2"));
        assert!(t.subtree_at_mut(&["a", "b", "c"]).is_none());
    }
}
