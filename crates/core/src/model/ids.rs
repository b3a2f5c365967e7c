use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a roadmap item, unique within one roadmap.
///
/// Ids come from imported documents, so they are kept as opaque strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new `ItemId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn item_id_display() {
        let id = ItemId::new("rust-basics");
        assert_eq!(id.to_string(), "rust-basics");
    }

    #[test]
    fn item_id_display_honors_width() {
        assert_eq!(format!("[{:<5}]", ItemId::new("a")), "[a    ]");
        assert_eq!(format!("[{:>3}]", ItemId::new("ab")), "[ ab]");
    }

    #[test]
    fn item_id_serializes_as_plain_string() {
        let id = ItemId::new("a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"a\"");
    }

    #[test]
    fn item_id_map_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(ItemId::new("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }
}
