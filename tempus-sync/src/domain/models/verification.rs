use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Reference;
use crate::domain::SyncError;

/// Outcome of resolving a list of names against a remote listing.
/// `existing` follows input order; `missing` keeps the original spelling
/// so the operator sees exactly what they typed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub existing: Vec<Reference>,
    pub missing: Vec<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Case-insensitive, whitespace-trimmed lookup among resolved refs.
    pub fn find(&self, name: &str) -> Option<&Reference> {
        let needle = name.trim().to_lowercase();
        self.existing
            .iter()
            .find(|r| r.name.trim().to_lowercase() == needle)
    }
}

/// Task verification for one project scope. `project` is `None` for the
/// implicit "no project" bucket, whose task names can never resolve.
#[derive(Debug, Clone, Serialize)]
pub struct TaskBucket {
    pub project: Option<Reference>,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskVerification {
    pub buckets: Vec<TaskBucket>,
}

impl TaskVerification {
    pub fn is_complete(&self) -> bool {
        self.buckets.iter().all(|b| b.resolution.is_complete())
    }

    pub fn bucket_for(&self, project_id: &str) -> Option<&TaskBucket> {
        self.buckets
            .iter()
            .find(|b| b.project.as_ref().map(|p| p.id.as_str()) == Some(project_id))
    }
}

/// One row of the pre-commit preview. Rows that cannot be normalized stay
/// visible with their problems flagged; nothing is dropped from the set.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    pub index: usize,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub billable: bool,
    pub is_edit: bool,
    pub problems: Vec<String>,
}

#[derive(Debug)]
pub struct RowFailure {
    pub index: usize,
    pub error: SyncError,
}

/// Commit tally. Best-effort: `created + updated + failed.len() + skipped`
/// always equals the number of rows that entered the loop.
#[derive(Debug, Default)]
pub struct CommitOutcome {
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<RowFailure>,
    /// Rows not attempted because the loop was cancelled.
    pub skipped: usize,
}

impl CommitOutcome {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.failed.len() + self.skipped
    }
}

/// Passed to `on_progress` callbacks after each row or batch.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub last_error: Option<String>,
}
