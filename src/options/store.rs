//! Plain key/value option store with a default snapshot.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::value::OptionValue;

/// Key to value mapping that remembers its defaults and which keys were
/// ever written.
///
/// Unknown keys are accepted on write (plugins register ad-hoc keys) and
/// read back as `None`, which is distinct from a stored
/// [`OptionValue::Null`].
#[derive(Debug, Clone, Default)]
pub struct OptionStore {
    defaults: IndexMap<String, OptionValue>,
    values: IndexMap<String, OptionValue>,
    explicit: HashSet<String>,
}

impl OptionStore {
    pub fn new<K, I>(defaults: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, OptionValue)>,
    {
        let defaults: IndexMap<String, OptionValue> =
            defaults.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            values: defaults.clone(),
            defaults,
            explicit: HashSet::new(),
        }
    }

    /// Current value, or `None` if the key is unknown.
    pub fn get(&self, key: &str) -> Option<OptionValue> {
        self.values.get(key).cloned()
    }

    pub fn get_ref(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn default_value(&self, key: &str) -> Option<&OptionValue> {
        self.defaults.get(key)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store `value` and mark the key as explicitly set.
    pub fn set(&mut self, key: &str, value: OptionValue) {
        self.write(key, value);
    }

    /// Same as [`set`](Self::set); hooks call this to record a value
    /// without re-entering hook dispatch.
    pub fn set_explicit(&mut self, key: &str, value: OptionValue) {
        self.write(key, value);
    }

    /// Apply `set` for every pair in iteration order.
    pub fn update<K, I>(&mut self, values: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, OptionValue)>,
    {
        for (key, value) in values {
            self.set(key.as_ref(), value);
        }
    }

    /// Every known key with its current value, catalog keys first.
    pub fn items(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether the key has been written since construction. Never resets.
    pub fn is_explicit(&self, key: &str) -> bool {
        self.explicit.contains(key)
    }

    /// Flag a key as written when a hook stored its value elsewhere.
    pub(crate) fn mark_explicit(&mut self, key: &str) {
        if !self.explicit.contains(key) {
            self.explicit.insert(key.to_string());
        }
    }

    fn write(&mut self, key: &str, value: OptionValue) {
        let value = match self.defaults.get(key) {
            Some(default) => value.coerce_like(default),
            None => value,
        };
        self.values.insert(key.to_string(), value);
        self.mark_explicit(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OptionStore {
        OptionStore::new([
            ("a", OptionValue::Int(1)),
            ("b", OptionValue::Null),
            ("names", OptionValue::List(vec![])),
        ])
    }

    #[test]
    fn get_returns_defaults() {
        let store = store();
        assert_eq!(store.get("a"), Some(OptionValue::Int(1)));
        assert_eq!(store.get("b"), Some(OptionValue::Null));
    }

    #[test]
    fn unknown_key_is_absent_not_null() {
        let store = store();
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn set_marks_explicit() {
        let mut store = store();
        assert!(!store.is_explicit("a"));
        store.set("a", OptionValue::Int(2));
        assert!(store.is_explicit("a"));
        assert_eq!(store.get("a"), Some(OptionValue::Int(2)));
    }

    #[test]
    fn explicit_flag_survives_resetting_to_default() {
        let mut store = store();
        store.set("a", OptionValue::Int(5));
        store.set("a", OptionValue::Int(1));
        assert!(store.is_explicit("a"));
    }

    #[test]
    fn unknown_keys_are_accepted() {
        let mut store = store();
        store.set("plugin-token", OptionValue::from("abc"));
        assert_eq!(store.get("plugin-token"), Some(OptionValue::from("abc")));
        assert_eq!(store.default_value("plugin-token"), None);
        assert_eq!(store.items().last().map(|(k, _)| k), Some("plugin-token"));
    }

    #[test]
    fn scalar_is_wrapped_for_list_keys() {
        let mut store = store();
        store.set("names", OptionValue::from("x"));
        assert_eq!(store.get("names"), Some(OptionValue::from(vec!["x"])));
    }

    #[test]
    fn update_applies_in_order() {
        let mut store = store();
        store.update([("a", OptionValue::Int(2)), ("a", OptionValue::Int(3))]);
        assert_eq!(store.get("a"), Some(OptionValue::Int(3)));
    }

    #[test]
    fn items_include_defaults() {
        let store = store();
        let keys: Vec<&str> = store.items().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "names"]);
    }
}
