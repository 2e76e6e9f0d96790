//! Reads across an ordered list of layers, most specific first.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use strata_core_store::{Key, Value};

use crate::entry::{BackingStore, Lookup};

/// Which names below a prefix to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// Every key below the prefix, as a relative path.
    AllKeys,
    /// Keys directly under the prefix.
    ChildKeys,
    /// Groups directly under the prefix.
    ChildGroups,
}

/// First value for `path` in layer order.
///
/// A tombstone in a layer hides the key in every layer after it.
pub fn get(layers: &[Arc<BackingStore>], path: &str) -> Option<Value> {
    for layer in layers {
        let key = Key::parse(path, layer.case_sensitivity()).ok()?;
        match layer.lookup(&key) {
            Lookup::Hit(value) => return Some(value),
            Lookup::Tombstone => return None,
            Lookup::Miss => {}
        }
    }
    None
}

/// Names below `prefix` across all layers.
///
/// Results are relative to `prefix`, keep the casing of the layer that
/// contributed them first, and come back sorted by comparison form.
pub fn children(layers: &[Arc<BackingStore>], prefix: &str, kind: ChildKind) -> Vec<String> {
    let depth = prefix.split('/').filter(|s| !s.is_empty()).count();
    let mut found: BTreeMap<String, String> = BTreeMap::new();
    let mut tombstones: Vec<String> = Vec::new();

    for layer in layers {
        let case = layer.case_sensitivity();
        let folded_prefix = case.fold(prefix);
        let hidden: HashSet<String> = tombstones.iter().map(|t| case.fold(t)).collect();
        let (effective, removed) = layer.view();

        for key in effective.keys() {
            if hidden.contains(key.folded()) || !key.is_within(&folded_prefix) {
                continue;
            }
            let Some(rel) = key.relative(depth) else {
                continue;
            };
            let name = match kind {
                ChildKind::AllKeys => rel,
                ChildKind::ChildKeys if !rel.contains('/') => rel,
                ChildKind::ChildKeys => continue,
                ChildKind::ChildGroups => match rel.split_once('/') {
                    Some((group, _)) => group.to_string(),
                    None => continue,
                },
            };
            found.entry(case.fold(&name)).or_insert(name);
        }

        tombstones.extend(removed.iter().map(|k| k.as_str().to_string()));
    }

    found.into_values().collect()
}

/// Count the contiguous numbered groups `1, 2, ...` under `prefix`.
pub fn contiguous_elements(layers: &[Arc<BackingStore>], prefix: &str) -> usize {
    let indices: HashSet<usize> = children(layers, prefix, ChildKind::ChildGroups)
        .iter()
        .filter_map(|g| g.parse().ok())
        .collect();
    (1..).take_while(|i| indices.contains(i)).count()
}
