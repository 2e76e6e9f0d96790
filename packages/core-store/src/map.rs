//! KeyValueMap - the flat key/value content of one backing file.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::{Key, Value};

/// A map from normalized keys to values.
///
/// Lookups go by comparison form. Each key keeps the position it was first
/// inserted with, so `ordered()` can reproduce the file's key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyValueMap {
    entries: BTreeMap<Key, Value>,
}

impl KeyValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The stored key equal to `key`, carrying its original text and position.
    pub fn get_key(&self, key: &Key) -> Option<&Key> {
        self.entries.get_key_value(key).map(|(k, _)| k)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value.
    ///
    /// When the key is already present its stored key (and position) is
    /// kept and only the value changes.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        match self.entries.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.insert(key, value);
                None
            }
        }
    }

    /// Insert a value, replacing the stored key as well.
    pub fn replace(&mut self, key: Key, value: Value) -> Option<Value> {
        let old = self.entries.remove(&key);
        self.entries.insert(key, value);
        old
    }

    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Key, &Value) -> bool) {
        self.entries.retain(|k, v| keep(k, v));
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Key, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, Key, Value> {
        self.entries.keys()
    }

    /// Entries in rewrite order: by position, unpositioned keys last.
    pub fn ordered(&self) -> Vec<(&Key, &Value)> {
        let mut entries: Vec<(&Key, &Value)> = self.entries.iter().collect();
        entries.sort_by(|(a, _), (b, _)| {
            let a_pos = a.position().unwrap_or(usize::MAX);
            let b_pos = b.position().unwrap_or(usize::MAX);
            a_pos.cmp(&b_pos).then_with(|| a.folded().cmp(b.folded()))
        });
        entries
    }

    /// Highest position held by any key.
    pub fn max_position(&self) -> Option<usize> {
        self.entries.keys().filter_map(Key::position).max()
    }
}

impl FromIterator<(Key, Value)> for KeyValueMap {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        let mut map = KeyValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for KeyValueMap {
    type Item = (Key, Value);
    type IntoIter = btree_map::IntoIter<Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyValueMap {
    type Item = (&'a Key, &'a Value);
    type IntoIter = btree_map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;

    #[test]
    fn insert_keeps_first_position() {
        let mut map = KeyValueMap::new();
        map.insert(key!("a").with_position(4), Value::from(1i64));
        map.insert(key!("a").with_position(9), Value::from(2i64));

        assert_eq!(map.get(&key!("a")), Some(&Value::from(2i64)));
        assert_eq!(map.get_key(&key!("a")).unwrap().position(), Some(4));
    }

    #[test]
    fn replace_swaps_key() {
        let mut map = KeyValueMap::new();
        map.insert(key!("a").with_position(4), Value::from(1i64));
        map.replace(key!("a").with_position(9), Value::from(2i64));
        assert_eq!(map.get_key(&key!("a")).unwrap().position(), Some(9));
    }

    #[test]
    fn ordered_by_position_then_name() {
        let map: KeyValueMap = vec![
            (key!("z").with_position(0), Value::from(1i64)),
            (key!("b"), Value::from(2i64)),
            (key!("a").with_position(1), Value::from(3i64)),
            (key!("c"), Value::from(4i64)),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = map.ordered().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "b", "c"]);
        assert_eq!(map.max_position(), Some(1));
    }

    #[test]
    fn retain_and_remove() {
        let mut map: KeyValueMap = vec![
            (key!("g/a"), Value::from(1i64)),
            (key!("g/b"), Value::from(2i64)),
            (key!("h"), Value::from(3i64)),
        ]
        .into_iter()
        .collect();

        map.retain(|k, _| !k.is_within("g"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove(&key!("h")), Some(Value::from(3i64)));
        assert!(map.is_empty());
    }
}
