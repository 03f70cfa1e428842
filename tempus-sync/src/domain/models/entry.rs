use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntryId, ProjectId, TagId, TaskId, UserId};

/// A time entry as known upstream. The remote service is authoritative;
/// this model never outlives the operation that fetched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: EntryId,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    /// `None` means the entry is still running.
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub tag_ids: Vec<TagId>,
    pub billable: bool,
    pub user_id: Option<UserId>,
}

/// A fully normalized, id-only payload for creating an entry. Names never
/// appear here, so nothing client-only can leak over the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub tag_ids: Vec<TagId>,
    pub billable: bool,
}

/// A partial patch: only `Some` fields are sent upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub tag_ids: Option<Vec<TagId>>,
    pub billable: Option<bool>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.project_id.is_none()
            && self.task_id.is_none()
            && self.tag_ids.is_none()
            && self.billable.is_none()
    }
}
