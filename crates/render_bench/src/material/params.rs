//! Raw material parameters
//!
//! The string bag attached to a host entity or read from a card. Keys keep
//! their spelling; lookups used by the normalizer are case-insensitive.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

/// Key naming the material kind
pub const SHADER_KEY: &str = "Shader";

/// Key naming a parent card whose parameters are inherited
pub const FATHER_KEY: &str = "Father";

/// Prefix of verbatim SDL keys (`Passthrough.<backend>[.<n>]`)
pub const PASSTHROUGH_PREFIX: &str = "Passthrough.";

/// Unordered `key -> value` parameter bag
///
/// Stored sorted so that iteration, and everything derived from it, is
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawParams(BTreeMap<String, String>);

impl RawParams {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value of the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`RawParams::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value of a key, exact spelling
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of a key, ignoring ASCII case
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the key is present, exact spelling
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over `(key, value)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Backend tags that carry passthrough text, in key order, without duplicates
    pub fn passthrough_backends(&self) -> Vec<String> {
        let mut backends: Vec<String> = Vec::new();
        for (key, _) in self.iter() {
            if let Some(backend) = passthrough_backend_of(key) {
                if !backends.iter().any(|b| b.eq_ignore_ascii_case(backend)) {
                    backends.push(backend.to_string());
                }
            }
        }
        backends
    }

    /// Verbatim SDL supplied for a backend (tag compared ignoring case)
    ///
    /// `Passthrough.<backend>` and its numbered continuation lines
    /// `Passthrough.<backend>.<n>` are joined with newlines in key order.
    pub fn passthrough_text(&self, backend: &str) -> Option<String> {
        let lines: Vec<&str> = self
            .iter()
            .filter(|(key, _)| passthrough_backend_of(key).is_some_and(|b| b.eq_ignore_ascii_case(backend)))
            .map(|(_, value)| value)
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Backend tag of a passthrough key, if the key is one
fn passthrough_backend_of(key: &str) -> Option<&str> {
    let head = key.get(..PASSTHROUGH_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(PASSTHROUGH_PREFIX) {
        return None;
    }
    let rest = &key[PASSTHROUGH_PREFIX.len()..];
    let backend = rest.split('.').next().unwrap_or(rest);
    (!backend.is_empty()).then_some(backend)
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for RawParams {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let raw = RawParams::from([("shader", "Glass")]);
        assert_eq!(raw.get(SHADER_KEY), None);
        assert_eq!(raw.get_ignore_case(SHADER_KEY), Some("Glass"));
    }

    #[test]
    fn test_passthrough_lines_join_in_key_order() {
        let raw = RawParams::from([
            ("Passthrough.LuxCore.0002", "scene.materials.%NAME%.kd = 1 0 0"),
            ("Passthrough.LuxCore.0001", "scene.materials.%NAME%.type = matte"),
            ("Passthrough.Pbrt", "Material \"diffuse\""),
        ]);
        assert_eq!(
            raw.passthrough_text("luxcore").unwrap(),
            "scene.materials.%NAME%.type = matte\nscene.materials.%NAME%.kd = 1 0 0"
        );
        assert_eq!(raw.passthrough_backends(), vec!["LuxCore".to_string(), "Pbrt".to_string()]);
        assert!(raw.passthrough_text("Appleseed").is_none());
    }
}
