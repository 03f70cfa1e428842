use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::domain::{
    models::{
        CandidateRow, CommitOutcome, PreviewRow, Progress, ProjectId, ProjectRef, RefKind,
        Reference, Resolution, RowFailure, TagId, TagsRef, TaskBucket, TaskId, TaskRef,
        TaskVerification,
    },
    ports::outbound::{DirectoryClient, TimeEntryClient},
    services::{EntryWriter, PatchRequest, WriteRequest},
    wall_time, SyncError,
};

/// How many normalized rows the preview projection shows by default.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// The operator-visible workflow stage. Each variant carries the immutable
/// verification snapshot taken at that transition; re-running a
/// verification replaces its snapshot wholesale.
#[derive(Debug)]
pub enum Stage {
    Parsed,
    ProjectsVerified {
        projects: Resolution,
    },
    TasksVerified {
        projects: Resolution,
        tasks: TaskVerification,
    },
    PreviewReady {
        projects: Resolution,
        tasks: TaskVerification,
        tags: Resolution,
        preview: Vec<PreviewRow>,
    },
    Committed {
        outcome: CommitOutcome,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Parsed => "parsed",
            Stage::ProjectsVerified { .. } => "projects-verified",
            Stage::TasksVerified { .. } => "tasks-verified",
            Stage::PreviewReady { .. } => "preview-ready",
            Stage::Committed { .. } => "committed",
        }
    }
}

/// Drives a batch of candidate rows through
/// parse -> verify projects -> verify tasks -> verify tags & preview ->
/// commit. Transitions are operator-driven; nothing advances on its own,
/// and a stage never advances while its missing-list is non-empty.
pub struct IntakeWorkflow<C, D> {
    writer: EntryWriter<C, D>,
    rows: Vec<CandidateRow>,
    stage: Stage,
}

impl<C: TimeEntryClient, D: DirectoryClient> IntakeWorkflow<C, D> {
    pub fn new(writer: EntryWriter<C, D>, rows: Vec<CandidateRow>) -> Self {
        Self {
            writer,
            rows,
            stage: Stage::Parsed,
        }
    }

    pub fn rows(&self) -> &[CandidateRow] {
        &self.rows
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn writer(&self) -> &EntryWriter<C, D> {
        &self.writer
    }

    /// Discard the current verification snapshot. Allowed at any point
    /// before commit.
    pub fn abandon(&mut self) -> Result<(), SyncError> {
        if matches!(self.stage, Stage::Committed { .. }) {
            return Err(self.violation("workflow already committed"));
        }
        self.stage = Stage::Parsed;
        Ok(())
    }

    fn violation(&self, reason: impl Into<String>) -> SyncError {
        SyncError::StageViolation {
            stage: self.stage.name(),
            reason: reason.into(),
        }
    }

    // ------------------------------------------------------------------
    // Stage 1: projects
    // ------------------------------------------------------------------

    /// Resolve all distinct by-name project references. Advances to
    /// `ProjectsVerified` only when nothing is missing; re-running is
    /// always allowed and replaces the previous result.
    pub async fn verify_projects(&mut self) -> Result<Resolution, SyncError> {
        if matches!(self.stage, Stage::Committed { .. }) {
            return Err(self.violation("workflow already committed"));
        }

        let names: Vec<String> = self
            .rows
            .iter()
            .filter_map(|row| match &row.project {
                Some(ProjectRef::ByName(name)) if !name.trim().is_empty() => {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect();

        let projects = self.writer.resolver().resolve_projects(&names).await?;
        tracing::info!(
            "project verification: {} resolved, {} missing",
            projects.existing.len(),
            projects.missing.len()
        );

        if projects.is_complete() {
            self.stage = Stage::ProjectsVerified {
                projects: projects.clone(),
            };
        } else {
            self.stage = Stage::Parsed;
        }
        Ok(projects)
    }

    pub async fn create_missing_projects(
        &self,
        names: &[String],
    ) -> Result<Vec<Reference>, SyncError> {
        self.writer.resolver().create_missing_projects(names).await
    }

    // ------------------------------------------------------------------
    // Stage 2: tasks
    // ------------------------------------------------------------------

    /// Resolve by-name tasks per project bucket. Rows with a task name but
    /// no project land in the implicit no-project bucket, where they stay
    /// unresolved (a task cannot exist without a project scope).
    pub async fn verify_tasks(&mut self) -> Result<TaskVerification, SyncError> {
        let projects = match &self.stage {
            Stage::ProjectsVerified { projects }
            | Stage::TasksVerified { projects, .. }
            | Stage::PreviewReady { projects, .. } => projects.clone(),
            _ => return Err(self.violation("verify projects first")),
        };

        // project id -> (display reference, distinct task names)
        let mut buckets: HashMap<String, (Reference, Vec<String>)> = HashMap::new();
        let mut orphan_tasks: Vec<String> = Vec::new();

        for row in &self.rows {
            let task_name = match &row.task {
                Some(TaskRef::ByName(name)) if !name.trim().is_empty() => name.clone(),
                _ => continue,
            };

            let project = match &row.project {
                Some(ProjectRef::ById(id)) => Some(
                    projects
                        .existing
                        .iter()
                        .find(|r| r.id == id.as_str())
                        .cloned()
                        .unwrap_or_else(|| Reference::new(id.as_str(), id.as_str())),
                ),
                Some(ProjectRef::ByName(name)) => projects.find(name).cloned(),
                None => None,
            };

            match project {
                Some(project) => {
                    let bucket = buckets
                        .entry(project.id.clone())
                        .or_insert_with(|| (project, Vec::new()));
                    if !bucket.1.iter().any(|n| n.eq_ignore_ascii_case(&task_name)) {
                        bucket.1.push(task_name);
                    }
                }
                None => {
                    if !orphan_tasks.iter().any(|n| n.eq_ignore_ascii_case(&task_name)) {
                        orphan_tasks.push(task_name);
                    }
                }
            }
        }

        let mut verification = TaskVerification::default();
        for (project_id, (project, names)) in buckets {
            let resolution = self
                .writer
                .resolver()
                .resolve_tasks(&ProjectId::from(project_id), &names)
                .await?;
            verification.buckets.push(TaskBucket {
                project: Some(project),
                resolution,
            });
        }
        if !orphan_tasks.is_empty() {
            verification.buckets.push(TaskBucket {
                project: None,
                resolution: Resolution {
                    existing: Vec::new(),
                    missing: orphan_tasks,
                },
            });
        }

        if verification.is_complete() {
            self.stage = Stage::TasksVerified {
                projects,
                tasks: verification.clone(),
            };
        } else {
            self.stage = Stage::ProjectsVerified { projects };
        }
        Ok(verification)
    }

    /// Bulk-create missing tasks under one project without leaving the
    /// stage; the operator re-runs `verify_tasks` afterwards.
    pub async fn create_missing_tasks(
        &self,
        project: &ProjectId,
        names: &[String],
    ) -> Result<Vec<Reference>, SyncError> {
        self.writer
            .resolver()
            .create_missing_tasks(project, names)
            .await
    }

    // ------------------------------------------------------------------
    // Stage 3: tags & preview
    // ------------------------------------------------------------------

    /// Resolve the workspace-global union of tag names and compute the
    /// preview projection. Always advances to `PreviewReady` — the preview
    /// is for operator review either way — but commit stays blocked while
    /// tags are missing.
    pub async fn verify_tags(
        &mut self,
        preview_limit: usize,
    ) -> Result<(Resolution, Vec<PreviewRow>), SyncError> {
        let (projects, tasks) = match &self.stage {
            Stage::TasksVerified { projects, tasks }
            | Stage::PreviewReady {
                projects, tasks, ..
            } => (projects.clone(), tasks.clone()),
            _ => return Err(self.violation("verify tasks first")),
        };

        let names: Vec<String> = self
            .rows
            .iter()
            .filter_map(|row| match &row.tags {
                TagsRef::Names(names) => Some(names.clone()),
                TagsRef::Ids(_) => None,
            })
            .flatten()
            .collect();

        let tags = self.writer.resolver().resolve_tags(&names).await?;
        let preview = self.build_preview(&projects, &tasks, &tags, preview_limit);

        self.stage = Stage::PreviewReady {
            projects,
            tasks,
            tags: tags.clone(),
            preview: preview.clone(),
        };
        Ok((tags, preview))
    }

    pub async fn create_missing_tags(&self, names: &[String]) -> Result<Vec<Reference>, SyncError> {
        self.writer.resolver().create_missing_tags(names).await
    }

    fn build_preview(
        &self,
        projects: &Resolution,
        tasks: &TaskVerification,
        tags: &Resolution,
        limit: usize,
    ) -> Vec<PreviewRow> {
        self.rows
            .iter()
            .take(limit)
            .enumerate()
            .map(|(index, row)| {
                let mut problems = Vec::new();

                let start = match wall_time::to_instant(&row.start, self.writer.zone()) {
                    Ok(instant) => Some(instant),
                    Err(e) => {
                        problems.push(e.to_string());
                        None
                    }
                };
                let end = row.end.as_deref().and_then(|raw| {
                    match wall_time::to_instant(raw, self.writer.zone()) {
                        Ok(instant) => Some(instant),
                        Err(e) => {
                            problems.push(e.to_string());
                            None
                        }
                    }
                });
                if let (Some(start), Some(end)) = (start, end) {
                    if start >= end {
                        problems.push(SyncError::TimeOrdering { start, end }.to_string());
                    }
                }

                let resolved = self.resolve_row(row, Some((projects, tasks, tags)));
                let (project_id, task_id, tag_ids) = match resolved {
                    Ok(ids) => ids,
                    Err(e) => {
                        problems.push(e.to_string());
                        (None, None, Vec::new())
                    }
                };

                PreviewRow {
                    index,
                    description: row.description.clone(),
                    start,
                    end,
                    project_id: project_id.map(|p| p.to_string()),
                    task_id: task_id.map(|t| t.to_string()),
                    tag_ids: tag_ids.iter().map(|t| t.to_string()).collect(),
                    billable: row.billable.unwrap_or(false),
                    is_edit: row.entry_id.is_some(),
                    problems,
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Stage 4: commit
    // ------------------------------------------------------------------

    /// Best-effort sequential commit: create new rows, update rows that
    /// carry an entry id. A failed row is tallied and the loop keeps
    /// going; `cancel` is checked between rows, so remaining rows are
    /// skipped but an in-flight call is not interrupted.
    pub async fn commit(
        &mut self,
        cancel: &AtomicBool,
        mut on_progress: Option<&mut (dyn FnMut(Progress) + Send)>,
    ) -> Result<&CommitOutcome, SyncError> {
        let snapshots = match &self.stage {
            Stage::PreviewReady {
                projects,
                tasks,
                tags,
                ..
            } => {
                if let Some(first_missing) = tags.missing.first() {
                    return Err(SyncError::unresolved(RefKind::Tag, first_missing.clone()));
                }
                Some((projects.clone(), tasks.clone(), tags.clone()))
            }
            Stage::Committed { .. } => {
                return Err(self.violation("workflow already committed"))
            }
            _ => return Err(self.violation("verification incomplete")),
        };

        let outcome = self
            .run_commit_loop(
                snapshots.as_ref().map(|s| (&s.0, &s.1, &s.2)),
                cancel,
                &mut on_progress,
            )
            .await;

        self.stage = Stage::Committed { outcome };
        match &self.stage {
            Stage::Committed { outcome } => Ok(outcome),
            _ => unreachable!(),
        }
    }

    /// Commit without any verification stage. Only legal when every row
    /// references projects, tasks, and tags by id — rows that already went
    /// through an earlier bulk fetch, for example.
    pub async fn commit_unverified(
        &mut self,
        cancel: &AtomicBool,
        mut on_progress: Option<&mut (dyn FnMut(Progress) + Send)>,
    ) -> Result<&CommitOutcome, SyncError> {
        if matches!(self.stage, Stage::Committed { .. }) {
            return Err(self.violation("workflow already committed"));
        }
        if let Some(row) = self.rows.iter().find(|row| !row.is_fully_identified()) {
            return Err(self.violation(format!(
                "row with by-name reference cannot skip verification: {:?}",
                row.description
            )));
        }

        let outcome = self.run_commit_loop(None, cancel, &mut on_progress).await;
        self.stage = Stage::Committed { outcome };
        match &self.stage {
            Stage::Committed { outcome } => Ok(outcome),
            _ => unreachable!(),
        }
    }

    async fn run_commit_loop(
        &self,
        snapshots: Option<(&Resolution, &TaskVerification, &Resolution)>,
        cancel: &AtomicBool,
        on_progress: &mut Option<&mut (dyn FnMut(Progress) + Send)>,
    ) -> CommitOutcome {
        let total = self.rows.len();
        let mut outcome = CommitOutcome::default();

        for (index, row) in self.rows.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                outcome.skipped = total - index;
                tracing::info!("commit cancelled, {} rows skipped", outcome.skipped);
                break;
            }

            let result = self.commit_row(row, snapshots).await;
            let last_error = match result {
                Ok(RowAction::Created) => {
                    outcome.created += 1;
                    None
                }
                Ok(RowAction::Updated) => {
                    outcome.updated += 1;
                    None
                }
                Err(error) => {
                    tracing::warn!("row {} failed: {}", index, error);
                    let message = error.to_string();
                    outcome.failed.push(RowFailure { index, error });
                    Some(message)
                }
            };

            if let Some(cb) = on_progress.as_deref_mut() {
                cb(Progress {
                    completed: index + 1,
                    total,
                    last_error,
                });
            }
        }

        tracing::info!(
            "commit finished: {} created, {} updated, {} failed, {} skipped",
            outcome.created,
            outcome.updated,
            outcome.failed.len(),
            outcome.skipped
        );
        outcome
    }

    async fn commit_row(
        &self,
        row: &CandidateRow,
        snapshots: Option<(&Resolution, &TaskVerification, &Resolution)>,
    ) -> Result<RowAction, SyncError> {
        let attempt = self.commit_row_once(row, snapshots).await;

        // A denied rate-limit window is the one failure worth pausing
        // for: wait out the window once, then retry the row.
        match attempt {
            Err(SyncError::RateLimited { reset_at }) => {
                let wait = (reset_at - Utc::now()).to_std().unwrap_or_default();
                tracing::info!("rate limited, pausing commit for {:?}", wait);
                tokio::time::sleep(wait).await;
                self.commit_row_once(row, snapshots).await
            }
            other => other,
        }
    }

    async fn commit_row_once(
        &self,
        row: &CandidateRow,
        snapshots: Option<(&Resolution, &TaskVerification, &Resolution)>,
    ) -> Result<RowAction, SyncError> {
        let (project_id, task_id, tag_ids) = self.resolve_row(row, snapshots)?;

        match &row.entry_id {
            Some(entry_id) => {
                // An edit row with no tags supplied leaves the remote
                // entry's tags alone, like the other absent fields; a
                // patched-in empty set would clear them upstream.
                let tags = if row.tags.is_empty() {
                    None
                } else {
                    Some(TagsRef::Ids(tag_ids))
                };
                let req = PatchRequest {
                    description: row.description.clone(),
                    start: Some(row.start.clone()),
                    end: row.end.clone(),
                    project_id,
                    task_id,
                    tags,
                    billable: row.billable,
                };
                self.writer.update(entry_id, &req).await?;
                Ok(RowAction::Updated)
            }
            None => {
                let req = WriteRequest {
                    description: row.description.clone(),
                    start: row.start.clone(),
                    end: row.end.clone(),
                    project_id,
                    task_id,
                    tags: TagsRef::Ids(tag_ids),
                    billable: row.billable,
                };
                self.writer.create(&req).await?;
                Ok(RowAction::Created)
            }
        }
    }

    /// Map a row's references to ids using the verification snapshots.
    /// With no snapshots, only by-id references are legal.
    #[allow(clippy::type_complexity)]
    fn resolve_row(
        &self,
        row: &CandidateRow,
        snapshots: Option<(&Resolution, &TaskVerification, &Resolution)>,
    ) -> Result<(Option<ProjectId>, Option<TaskId>, Vec<TagId>), SyncError> {
        let project_id = match &row.project {
            None => None,
            Some(ProjectRef::ById(id)) => Some(id.clone()),
            Some(ProjectRef::ByName(name)) => {
                let (projects, _, _) = snapshots
                    .ok_or_else(|| SyncError::unresolved(RefKind::Project, name.clone()))?;
                Some(ProjectId::from(
                    projects
                        .find(name)
                        .ok_or_else(|| SyncError::unresolved(RefKind::Project, name.clone()))?
                        .id
                        .as_str(),
                ))
            }
        };

        let task_id = match &row.task {
            None => None,
            Some(TaskRef::ById(id)) => Some(id.clone()),
            Some(TaskRef::ByName(name)) => {
                let (_, tasks, _) = snapshots
                    .ok_or_else(|| SyncError::unresolved(RefKind::Task, name.clone()))?;
                let project_id = project_id
                    .as_ref()
                    .ok_or_else(|| SyncError::unresolved(RefKind::Task, name.clone()))?;
                let reference = tasks
                    .bucket_for(project_id.as_str())
                    .and_then(|bucket| bucket.resolution.find(name))
                    .ok_or_else(|| SyncError::unresolved(RefKind::Task, name.clone()))?;
                Some(TaskId::from(reference.id.as_str()))
            }
        };

        let tag_ids = match &row.tags {
            TagsRef::Ids(ids) => ids.clone(),
            TagsRef::Names(names) if names.is_empty() => Vec::new(),
            TagsRef::Names(names) => {
                let (_, _, tags) = snapshots.ok_or_else(|| {
                    SyncError::unresolved(RefKind::Tag, names.join(", "))
                })?;
                let mut ids = Vec::new();
                for name in names {
                    let reference = tags
                        .find(name)
                        .ok_or_else(|| SyncError::unresolved(RefKind::Tag, name.clone()))?;
                    let id = TagId::from(reference.id.as_str());
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                ids
            }
        };

        Ok((project_id, task_id, tag_ids))
    }
}

enum RowAction {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EntryDraft, UserId, WorkspaceId};
    use crate::domain::ports::outbound::TimeEntryClient as _;
    use crate::rate_limit::{RateLimitPolicy, RateLimiter};
    use crate::testing::{InMemoryDirectory, InMemoryTimeEntries};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn workflow(
        entries: InMemoryTimeEntries,
        directory: InMemoryDirectory,
        zone: &str,
        rows: Vec<CandidateRow>,
    ) -> IntakeWorkflow<InMemoryTimeEntries, InMemoryDirectory> {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::default()));
        let writer = EntryWriter::new(
            Arc::new(entries),
            Arc::new(directory),
            WorkspaceId::from("ws"),
            UserId::from("u1"),
            zone,
            limiter,
            "key-1",
        );
        IntakeWorkflow::new(writer, rows)
    }

    fn named_row(start: &str, project: &str) -> CandidateRow {
        CandidateRow::new(start)
            .with_end("2024-05-01T10:00")
            .with_project(ProjectRef::ByName(project.to_string()))
    }

    #[tokio::test]
    async fn verify_projects_blocks_until_all_resolve() {
        let directory = InMemoryDirectory::new().with_projects(["Ops"]);
        let rows = vec![
            named_row("2024-05-01T09:00", "Ops"),
            named_row("2024-05-01T11:00", "Platform"),
        ];
        let mut flow = workflow(InMemoryTimeEntries::new(), directory, "UTC", rows);

        let projects = flow.verify_projects().await.unwrap();
        assert_eq!(projects.missing, vec!["Platform".to_string()]);
        assert_eq!(flow.stage().name(), "parsed");

        flow.create_missing_projects(&projects.missing).await.unwrap();
        let projects = flow.verify_projects().await.unwrap();
        assert!(projects.is_complete());
        assert_eq!(flow.stage().name(), "projects-verified");
    }

    #[tokio::test]
    async fn task_without_project_scope_never_resolves() {
        let directory = InMemoryDirectory::new();
        let rows = vec![CandidateRow::new("2024-05-01T09:00")
            .with_task(TaskRef::ByName("triage".to_string()))];
        let mut flow = workflow(InMemoryTimeEntries::new(), directory, "UTC", rows);

        flow.verify_projects().await.unwrap();
        let tasks = flow.verify_tasks().await.unwrap();

        assert!(!tasks.is_complete());
        let orphan = tasks.buckets.iter().find(|b| b.project.is_none()).unwrap();
        assert_eq!(orphan.resolution.missing, vec!["triage".to_string()]);
        assert_eq!(flow.stage().name(), "projects-verified");
    }

    #[tokio::test]
    async fn verify_tags_requires_task_stage() {
        let mut flow = workflow(
            InMemoryTimeEntries::new(),
            InMemoryDirectory::new(),
            "UTC",
            vec![CandidateRow::new("2024-05-01T09:00")],
        );
        let err = flow.verify_tags(DEFAULT_PREVIEW_ROWS).await.unwrap_err();
        assert!(matches!(err, SyncError::StageViolation { .. }));
    }

    #[tokio::test]
    async fn spring_forward_gap_is_flagged_not_silently_shifted() {
        let directory = InMemoryDirectory::new()
            .with_projects(["Ops"])
            .with_tags(["meeting"]);
        let row = CandidateRow::new("2024-03-10T02:30")
            .with_end("2024-03-10T03:00")
            .with_description("Standup")
            .with_project(ProjectRef::ByName("Ops".to_string()))
            .with_tags(TagsRef::Names(vec!["meeting".to_string()]));
        let entries = InMemoryTimeEntries::new();
        let mut flow = workflow(entries.clone(), directory, "America/New_York", vec![row]);

        flow.verify_projects().await.unwrap();
        flow.verify_tasks().await.unwrap();
        let (tags, preview) = flow.verify_tags(DEFAULT_PREVIEW_ROWS).await.unwrap();
        assert!(tags.is_complete());

        // 02:30 does not exist on the US spring-forward day.
        assert!(preview[0].start.is_none());
        assert!(!preview[0].problems.is_empty());

        let cancel = AtomicBool::new(false);
        let outcome = flow.commit(&cancel, None).await.unwrap();
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(
            outcome.failed[0].error,
            SyncError::InvalidTimestamp(_)
        ));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn commit_creates_new_rows_and_updates_edits() {
        let directory = InMemoryDirectory::new().with_projects(["Ops"]);
        let entries = InMemoryTimeEntries::new();
        let workspace = WorkspaceId::from("ws");
        let existing = entries
            .create_entry(
                &workspace,
                &EntryDraft {
                    description: Some("old".to_string()),
                    start: Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap(),
                    end: None,
                    project_id: None,
                    task_id: None,
                    tag_ids: vec![],
                    billable: false,
                },
            )
            .await
            .unwrap();

        let rows = vec![
            named_row("2024-05-01T09:00", "Ops").with_description("new work"),
            CandidateRow::new("2024-05-01T12:00")
                .with_end("2024-05-01T13:00")
                .with_description("edited")
                .editing(existing.id.clone()),
        ];
        let mut flow = workflow(entries.clone(), directory, "UTC", rows);

        flow.verify_projects().await.unwrap();
        flow.verify_tasks().await.unwrap();
        flow.verify_tags(DEFAULT_PREVIEW_ROWS).await.unwrap();

        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let mut cb = |p: Progress| seen.push((p.completed, p.total));
        let outcome = flow.commit(&cancel, Some(&mut cb)).await.unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
        assert_eq!(
            entries.get(&existing.id).unwrap().description.as_deref(),
            Some("edited")
        );
        assert_eq!(flow.stage().name(), "committed");
    }

    #[tokio::test]
    async fn edit_without_tags_keeps_remote_tags() {
        let entries = InMemoryTimeEntries::new();
        let workspace = WorkspaceId::from("ws");
        let existing = entries
            .create_entry(
                &workspace,
                &EntryDraft {
                    description: Some("tagged work".to_string()),
                    start: Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap(),
                    end: None,
                    project_id: None,
                    task_id: None,
                    tag_ids: vec![TagId::from("g-1")],
                    billable: false,
                },
            )
            .await
            .unwrap();

        let rows = vec![CandidateRow::new("2024-05-01T08:00")
            .with_end("2024-05-01T09:00")
            .with_description("retitled")
            .editing(existing.id.clone())];
        let mut flow = workflow(entries.clone(), InMemoryDirectory::new(), "UTC", rows);

        let cancel = AtomicBool::new(false);
        let outcome = flow.commit_unverified(&cancel, None).await.unwrap();
        assert_eq!(outcome.updated, 1);

        let updated = entries.get(&existing.id).unwrap();
        assert_eq!(updated.description.as_deref(), Some("retitled"));
        assert_eq!(updated.tag_ids, vec![TagId::from("g-1")]);
    }

    #[tokio::test]
    async fn commit_blocked_while_tags_missing() {
        let directory = InMemoryDirectory::new().with_projects(["Ops"]);
        let rows = vec![named_row("2024-05-01T09:00", "Ops")
            .with_tags(TagsRef::Names(vec!["brand-new".to_string()]))];
        let mut flow = workflow(InMemoryTimeEntries::new(), directory, "UTC", rows);

        flow.verify_projects().await.unwrap();
        flow.verify_tasks().await.unwrap();
        let (tags, _) = flow.verify_tags(DEFAULT_PREVIEW_ROWS).await.unwrap();
        assert_eq!(tags.missing, vec!["brand-new".to_string()]);
        assert_eq!(flow.stage().name(), "preview-ready");

        let cancel = AtomicBool::new(false);
        let err = flow.commit(&cancel, None).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnresolvedReference {
                kind: RefKind::Tag,
                ..
            }
        ));
        // Still previewable; the operator can create the tag and retry.
        assert_eq!(flow.stage().name(), "preview-ready");
    }

    #[tokio::test]
    async fn commit_unverified_rejects_by_name_references() {
        let rows = vec![named_row("2024-05-01T09:00", "Ops")];
        let mut flow = workflow(
            InMemoryTimeEntries::new(),
            InMemoryDirectory::new(),
            "UTC",
            rows,
        );

        let cancel = AtomicBool::new(false);
        let err = flow.commit_unverified(&cancel, None).await.unwrap_err();
        assert!(matches!(err, SyncError::StageViolation { .. }));
    }

    #[tokio::test]
    async fn commit_unverified_accepts_fully_identified_rows() {
        let entries = InMemoryTimeEntries::new();
        let rows = vec![CandidateRow::new("2024-05-01T09:00")
            .with_end("2024-05-01T10:00")
            .with_description("id-only")];
        let mut flow = workflow(entries.clone(), InMemoryDirectory::new(), "UTC", rows);

        let cancel = AtomicBool::new(false);
        let outcome = flow.commit_unverified(&cancel, None).await.unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_rows() {
        let entries = InMemoryTimeEntries::new();
        let rows = vec![
            CandidateRow::new("2024-05-01T09:00"),
            CandidateRow::new("2024-05-01T11:00"),
        ];
        let mut flow = workflow(entries.clone(), InMemoryDirectory::new(), "UTC", rows);

        let cancel = AtomicBool::new(true);
        let outcome = flow.commit_unverified(&cancel, None).await.unwrap();
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped, 2);
        assert!(entries.is_empty());
    }
}
