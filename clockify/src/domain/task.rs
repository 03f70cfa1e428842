use serde::{Deserialize, Serialize};

/// A task within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
