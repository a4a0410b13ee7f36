use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::storage::CollectionName;

/// A stored document: keyed by the board's own id and bound to one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: CollectionName;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub id_board: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledImage {
    pub url: String,
    pub height: u32,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub edge_color: Option<String>,
    pub url: String,
    /// Display name, publication marker already removed.
    pub name: String,
    pub scaled: Vec<ScaledImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCard {
    pub id: String,
    pub name: String,
    pub short_link: String,
    pub id_list: String,
    pub tags: Vec<Tag>,
    pub cover: Option<Image>,
}

impl RecipeCard {
    pub fn has_tag_named(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetails {
    pub id: String,
    pub desc: String,
    pub images: Vec<Image>,
}

impl Document for Tag {
    const COLLECTION: CollectionName = CollectionName::Tags;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for RecipeCard {
    const COLLECTION: CollectionName = CollectionName::Recipes;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for RecipeDetails {
    const COLLECTION: CollectionName = CollectionName::Details;

    fn id(&self) -> &str {
        &self.id
    }
}
