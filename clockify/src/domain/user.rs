use serde::{Deserialize, Serialize};

/// The authenticated user, as returned by `GET /user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub default_workspace: Option<String>,
    #[serde(default)]
    pub active_workspace: Option<String>,
}
