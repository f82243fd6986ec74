//! Shared-header link resolution
//!
//! Archives with a `shared-data/header.properties` store repeated parameter
//! blocks once, in numbered pools, and reference them from segment headers:
//!
//! ```text
//! shared:  lcd-info.2.type=float-data
//! local:   channel.vDeflection.lcd-info.*=2
//! ```
//!
//! Resolution removes the `lcd-info` link node and merges `lcd-info.2` into
//! `channel.vDeflection`. When the node named after a pool holds no `*`
//! itself, every subtree below it that does is filled from that pool instead.

use super::parser::DATE_KEY;
use super::tree::{ParameterTree, PropertyNode};
use crate::Result;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Child key holding the pool index of a link
pub const LINK_MARKER: &str = "*";

/// Paths (key chains) of every node whose key names a shared pool
///
/// The walk does not descend below a matching key.
pub fn find_links(local: &ParameterTree, pool_keys: &BTreeSet<&str>) -> Vec<Vec<String>> {
    let mut links = Vec::new();
    walk_links(local, pool_keys, &mut Vec::new(), &mut links);
    links
}

fn walk_links(
    tree: &ParameterTree,
    pool_keys: &BTreeSet<&str>,
    chain: &mut Vec<String>,
    links: &mut Vec<Vec<String>>,
) {
    for (key, node) in tree.iter() {
        chain.push(key.to_string());
        if key != DATE_KEY && pool_keys.contains(key) {
            links.push(chain.clone());
        } else if let PropertyNode::Subtree(child) = node {
            walk_links(child, pool_keys, chain, links);
        }
        chain.pop();
    }
}

/// Merge the shared pools referenced from `local` into it
///
/// Returns the number of link markers replaced. Conflicting scalar values
/// fail with [`HeaderMergeConflict`](crate::JpkError::HeaderMergeConflict).
pub fn resolve_links(
    local: &mut ParameterTree,
    shared: &ParameterTree,
    trace_merges: bool,
) -> Result<usize> {
    let pool_keys: BTreeSet<&str> = shared.keys().filter(|k| *k != DATE_KEY).collect();
    let links = find_links(local, &pool_keys);

    let mut resolved = 0;
    for chain in &links {
        resolved += resolve_chain(local, chain, shared, trace_merges)?;
    }
    Ok(resolved)
}

fn resolve_chain(
    local: &mut ParameterTree,
    chain: &[String],
    shared: &ParameterTree,
    trace_merges: bool,
) -> Result<usize> {
    let Some((pool_key, parents)) = chain.split_last() else {
        return Ok(0);
    };
    let Some(parent) = local.subtree_at_mut(parents) else {
        return Ok(0);
    };

    let node = match parent.child(pool_key) {
        Some(PropertyNode::Subtree(node)) => node,
        _ => return Ok(0),
    };

    if let Some(index) = node.find_scalar(LINK_MARKER) {
        // Link node itself carries the index: replace it by the pool entry
        let index = index.to_string();
        let entry = pool_entry(shared, pool_key, &index)?;
        parent.remove(pool_key);
        log_merge(trace_merges, chain, pool_key, &index);
        parent.merge_under(entry, parents)?;
        return Ok(1);
    }

    // Otherwise fill every marked subtree below the node from the same pool
    let mut marked = Vec::new();
    collect_marked(node, &mut Vec::new(), &mut marked);

    let Some(node) = parent.subtree_at_mut(&[pool_key]) else {
        return Ok(0);
    };
    for relative in &marked {
        let Some(target) = node.subtree_at_mut(relative.as_slice()) else {
            continue;
        };
        let Some(PropertyNode::Scalar(index)) = target.remove(LINK_MARKER) else {
            continue;
        };
        let entry = pool_entry(shared, pool_key, &index)?;
        let full: Vec<String> = chain.iter().chain(relative.iter()).cloned().collect();
        log_merge(trace_merges, &full, pool_key, &index);
        target.merge_under(entry, &full)?;
    }
    Ok(marked.len())
}

fn pool_entry<'a>(shared: &'a ParameterTree, pool_key: &str, index: &str) -> Result<&'a ParameterTree> {
    shared.subtree(&format!("{}.{}", pool_key, index))
}

fn collect_marked(tree: &ParameterTree, chain: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for (key, node) in tree.iter() {
        if let PropertyNode::Subtree(child) = node {
            chain.push(key.to_string());
            if child.find_scalar(LINK_MARKER).is_some() {
                out.push(chain.clone());
            } else {
                collect_marked(child, chain, out);
            }
            chain.pop();
        }
    }
}

fn log_merge(trace_merges: bool, chain: &[String], pool_key: &str, index: &str) {
    if trace_merges {
        debug!("Merging shared {}.{} into {}", pool_key, index, chain.join("."));
    } else {
        trace!("Merging shared {}.{} into {}", pool_key, index, chain.join("."));
    }
}

/// Number of `*` link markers left anywhere in the tree
pub fn count_link_markers(tree: &ParameterTree) -> usize {
    tree.iter()
        .map(|(key, node)| match node {
            PropertyNode::Scalar(_) => usize::from(key == LINK_MARKER),
            PropertyNode::Subtree(child) => count_link_markers(child),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JpkError;

    fn tree(pairs: &[(&str, &str)]) -> ParameterTree {
        let mut t = ParameterTree::new();
        for (key, value) in pairs {
            let path: Vec<&str> = key.split('.').collect();
            t.insert_path(&path, value.to_string()).unwrap();
        }
        t
    }

    #[test]
    fn test_marked_subtree_below_pool_key() {
        let mut local = tree(&[("channel.h.*", "0")]);
        let shared = tree(&[("channel.0.gain", "5")]);

        let n = resolve_links(&mut local, &shared, false).unwrap();

        assert_eq!(n, 1);
        assert_eq!(local, tree(&[("channel.h.gain", "5")]));
    }

    #[test]
    fn test_link_node_replaced_by_pool_entry() {
        let mut local = tree(&[
            ("date", "today"),
            ("channel.vDeflection.lcd-info.*", "2"),
            ("channel.vDeflection.data.file.name", "vDeflection.dat"),
            ("force-segment-header.force-segment-header-info.*", "0"),
            ("force-segment-header.num-points", "3"),
        ]);
        let shared = tree(&[
            ("date", "yesterday"),
            ("lcd-info.2.type", "float-data"),
            ("lcd-info.2.encoder.scaling.style", "offsetmultiplier"),
            ("lcd-info.3.type", "short"),
            ("force-segment-header-info.0.settings.style", "retract"),
        ]);

        let n = resolve_links(&mut local, &shared, true).unwrap();

        assert_eq!(n, 2);
        assert_eq!(local.find_scalar("date"), Some("today"));
        assert_eq!(local.find_scalar("channel.vDeflection.type"), Some("float-data"));
        assert_eq!(
            local.find_scalar("channel.vDeflection.encoder.scaling.style"),
            Some("offsetmultiplier")
        );
        assert!(local.get("channel.vDeflection.lcd-info").is_none());
        assert_eq!(
            local.find_scalar("force-segment-header.settings.style"),
            Some("retract")
        );
        assert_eq!(count_link_markers(&local), 0);
    }

    #[test]
    fn test_conflicting_merge_fails() {
        let mut local = tree(&[("channel.h.*", "0"), ("channel.h.gain", "4")]);
        let shared = tree(&[("channel.0.gain", "5")]);

        let err = resolve_links(&mut local, &shared, false).unwrap_err();
        assert!(matches!(
            err,
            JpkError::HeaderMergeConflict { ref path } if path == "channel.h.gain"
        ));
    }

    #[test]
    fn test_equal_values_merge_cleanly() {
        let mut local = tree(&[("x.lcd-info.*", "1"), ("x.type", "short")]);
        let shared = tree(&[("lcd-info.1.type", "short")]);
        resolve_links(&mut local, &shared, false).unwrap();
        assert_eq!(local, tree(&[("x.type", "short")]));
    }

    #[test]
    fn test_missing_pool_entry() {
        let mut local = tree(&[("x.lcd-info.*", "7")]);
        let shared = tree(&[("lcd-info.1.type", "short")]);
        assert!(matches!(
            resolve_links(&mut local, &shared, false),
            Err(JpkError::MissingParameter(p)) if p == "lcd-info.7"
        ));
    }

    #[test]
    fn test_find_links_stops_at_pool_key() {
        let local = tree(&[("a.lcd-info.lcd-info.*", "1"), ("b.c", "2")]);
        let pools: BTreeSet<&str> = ["lcd-info"].into_iter().collect();
        let links = find_links(&local, &pools);
        assert_eq!(links, vec![vec!["a".to_string(), "lcd-info".to_string()]]);
    }

    #[test]
    fn test_count_link_markers() {
        let t = tree(&[("a.*", "1"), ("b.c.*", "2"), ("b.d", "3")]);
        assert_eq!(count_link_markers(&t), 2);
    }
}
