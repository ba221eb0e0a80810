//! Shadow identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a shadow: the owning thing plus a shadow name.
///
/// An empty shadow name denotes the classic (unnamed) shadow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShadowKey {
    thing_name: String,
    shadow_name: String,
}

impl ShadowKey {
    /// Creates a key for a named shadow.
    ///
    /// Shadow names are normalized: leading name separators are trimmed,
    /// so `("t1", "/")` and `("t1", "")` address the same classic shadow
    /// and `("t1", "/config")` equals `("t1", "config")`.
    pub fn new(thing_name: impl Into<String>, shadow_name: impl Into<String>) -> Self {
        let shadow_name = shadow_name.into();
        Self {
            thing_name: thing_name.into(),
            shadow_name: shadow_name.trim_start_matches('/').to_string(),
        }
    }

    /// Creates a key for the classic shadow of a thing.
    pub fn classic(thing_name: impl Into<String>) -> Self {
        Self::new(thing_name, "")
    }

    /// Returns the thing name.
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Returns the shadow name. Empty for the classic shadow.
    pub fn shadow_name(&self) -> &str {
        &self.shadow_name
    }

    /// Returns true if this is the classic shadow.
    pub fn is_classic(&self) -> bool {
        self.shadow_name.is_empty()
    }
}

impl fmt::Display for ShadowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shadow_name.is_empty() {
            write!(f, "{}", self.thing_name)
        } else {
            write!(f, "{}/{}", self.thing_name, self.shadow_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn classic_shadow_has_empty_name() {
        let key = ShadowKey::classic("thermostat");
        assert_eq!(key.thing_name(), "thermostat");
        assert_eq!(key.shadow_name(), "");
        assert!(key.is_classic());
    }

    #[test]
    fn display_forms() {
        assert_eq!(ShadowKey::classic("t1").to_string(), "t1");
        assert_eq!(ShadowKey::new("t1", "config").to_string(), "t1/config");
    }

    #[test]
    fn separator_spellings_normalize() {
        assert_eq!(ShadowKey::new("t1", "/"), ShadowKey::classic("t1"));
        assert!(ShadowKey::new("t1", "/").is_classic());
        assert_eq!(ShadowKey::new("t1", "/config"), ShadowKey::new("t1", "config"));
        assert_eq!(ShadowKey::new("t1", "//config").shadow_name(), "config");
    }

    #[test]
    fn usable_as_hash_key() {
        let mut set = HashSet::new();
        set.insert(ShadowKey::new("t1", "a"));
        set.insert(ShadowKey::new("t1", "a"));
        set.insert(ShadowKey::new("t1", "b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let key = ShadowKey::new("t1", "config");
        let json = serde_json::to_string(&key).unwrap();
        let back: ShadowKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
