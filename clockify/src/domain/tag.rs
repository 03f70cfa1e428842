use serde::{Deserialize, Serialize};

/// A workspace-global tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub name: String,
}

impl NewTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
