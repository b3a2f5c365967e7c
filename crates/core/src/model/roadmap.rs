use serde::{Deserialize, Serialize};

use crate::model::ids::ItemId;

/// Learning material attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// One topic of a roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Item {
    #[must_use]
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            resources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_resource(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.resources.push(Resource {
            title: title.into(),
            url: url.into(),
        });
        self
    }
}

/// Ordered set of topics to learn.
///
/// A roadmap is only ever replaced as a whole, by a successful import.
/// Item order is the display order and survives export/import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub items: Vec<Item>,
}

impl Roadmap {
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            items,
        }
    }

    /// First item with the given id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id.as_str() == id)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_lookup_takes_first_match() {
        let roadmap = Roadmap::new(
            "T",
            vec![Item::new("a", "First"), Item::new("a", "Second")],
        );
        assert_eq!(roadmap.item("a").unwrap().title, "First");
        assert!(roadmap.item("b").is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let roadmap: Roadmap =
            serde_json::from_str(r#"{"title":"T","items":[{"id":"a","title":"A"}]}"#).unwrap();
        assert_eq!(roadmap.description, "");
        assert!(roadmap.items[0].resources.is_empty());
    }
}
