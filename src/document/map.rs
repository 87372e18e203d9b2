use std::collections::HashMap;

/// Ordered mapping from flat key (colon-joined path) to string value.
///
/// Lookup is case-insensitive; stored keys keep the casing they were first
/// inserted with, and insertion order is preserved for generation.
#[derive(Debug, Clone, Default)]
pub struct FlatMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl FlatMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn fold(key: &str) -> String {
        key.to_lowercase()
    }

    /// Parse-time insertion. Returns `false` when the case-folded key is
    /// already present; never overwrites.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let folded = Self::fold(&key);
        if self.index.contains_key(&folded) {
            return false;
        }
        self.index.insert(folded, self.entries.len());
        self.entries.push((key, value.into()));
        true
    }

    /// Caller mutation. Upserts: an existing entry keeps its stored key
    /// casing and only the value changes; a new entry is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let folded = Self::fold(&key);
        match self.index.get(&folded) {
            Some(&i) => self.entries[i].1 = value.into(),
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push((key, value.into()));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(&Self::fold(key))
            .map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&Self::fold(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut map = FlatMap::new();
        assert!(map.insert("Foo:Bar", "1"));
        assert_eq!(map.get("foo:BAR"), Some("1"));
        assert_eq!(map.get("FOO:bar"), Some("1"));
        assert_eq!(map.get("foo:baz"), None);
    }

    #[test]
    fn test_insert_rejects_case_folded_duplicate() {
        let mut map = FlatMap::new();
        assert!(map.insert("Key", "a"));
        assert!(!map.insert("KEY", "b"));
        assert_eq!(map.get("key"), Some("a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_set_keeps_original_casing() {
        let mut map = FlatMap::new();
        map.set("Foo:Bar", "1");
        map.set("foo:bar", "2");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("FOO:BAR"), Some("2"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Foo:Bar"]);
    }

    #[test]
    fn test_iteration_preserves_insertion_order() {
        let mut map = FlatMap::new();
        map.set("b", "2");
        map.set("a", "1");
        map.set("c", "3");
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    proptest! {
        #[test]
        fn prop_get_after_set_ignores_casing(
            key in "[A-Za-z][A-Za-z0-9:]{0,20}",
            value in ".{0,20}",
        ) {
            let mut map = FlatMap::new();
            map.set(key.clone(), value.clone());
            prop_assert_eq!(map.get(&key.to_uppercase()), Some(value.as_str()));
            prop_assert_eq!(map.get(&key.to_lowercase()), Some(value.as_str()));
        }
    }
}
