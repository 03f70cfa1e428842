use serde::{Deserialize, Serialize};

use super::{EntryId, ProjectRef, TagId, TaskRef};

/// Tags on an intake row: either already-stable ids, or free-text labels
/// that the resolver turns into ids (creating missing tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagsRef {
    Ids(Vec<TagId>),
    Names(Vec<String>),
}

impl Default for TagsRef {
    fn default() -> Self {
        TagsRef::Names(Vec::new())
    }
}

impl TagsRef {
    pub fn is_empty(&self) -> bool {
        match self {
            TagsRef::Ids(ids) => ids.is_empty(),
            TagsRef::Names(names) => names.is_empty(),
        }
    }
}

/// One pre-validated intake row. Start/end are kept as the raw strings
/// the user entered: either naive local (`2024-03-10T02:30`) or an
/// already-absolute RFC 3339 instant. They never reach the remote API
/// without passing through the wall-time normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRef>,
    #[serde(default, skip_serializing_if = "TagsRef::is_empty")]
    pub tags: TagsRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    /// Present when the row edits an existing remote entry; commit then
    /// updates instead of creating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
}

impl CandidateRow {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            ..Default::default()
        }
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_project(mut self, project: ProjectRef) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_task(mut self, task: TaskRef) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_tags(mut self, tags: TagsRef) -> Self {
        self.tags = tags;
        self
    }

    pub fn editing(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    /// True when the row references nothing by name, i.e. it could be
    /// committed without any verification stage.
    pub fn is_fully_identified(&self) -> bool {
        let project_ok = !matches!(self.project, Some(ProjectRef::ByName(_)));
        let task_ok = !matches!(self.task, Some(TaskRef::ByName(_)));
        let tags_ok = matches!(&self.tags, TagsRef::Ids(_)) || self.tags.is_empty();
        project_ok && task_ok && tags_ok
    }
}
