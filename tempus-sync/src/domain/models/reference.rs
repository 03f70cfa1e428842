use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ProjectId, TaskId};

/// The kind of named remote object a resolver works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Project,
    Task,
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Project => write!(f, "project"),
            RefKind::Task => write!(f, "task"),
            RefKind::Tag => write!(f, "tag"),
        }
    }
}

/// A named remote object with a stable id. Tasks carry the owning
/// project's id as `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Reference {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// A project referenced either by a known id or by a human-entered name.
/// Resolved once at the resolver boundary; downstream code never re-checks
/// which shape it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectRef {
    ById(ProjectId),
    ByName(String),
}

/// A task reference; by-name tasks only make sense under a resolvable
/// project scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskRef {
    ById(TaskId),
    ByName(String),
}
