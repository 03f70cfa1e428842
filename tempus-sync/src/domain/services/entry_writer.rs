use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::batch::{run_batched, BatchOutcome, BatchPolicy};
use crate::domain::{
    models::{
        EntryDraft, EntryId, EntryPatch, ProjectId, RefKind, RemoteEntry, TagId, TagsRef,
        TaskId, UserId, WorkspaceId,
    },
    ports::outbound::{DirectoryClient, TimeEntryClient},
    services::ReferenceResolver,
    wall_time, SyncError,
};
use crate::rate_limit::RateLimiter;

/// Everything a single-entry create needs, before normalization. Times are
/// raw strings (naive local or absolute); tags may still be names.
/// Project/task must already be ids — name resolution for those belongs to
/// the verification workflow.
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    pub description: Option<String>,
    pub start: String,
    pub end: Option<String>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub tags: TagsRef,
    pub billable: Option<bool>,
}

/// Partial edit of an existing entry; absent fields keep their remote
/// value.
#[derive(Debug, Clone, Default)]
pub struct PatchRequest {
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub tags: Option<TagsRef>,
    pub billable: Option<bool>,
}

/// Applies the full mutation pipeline before anything touches the wire:
/// wall-time normalization, start/end ordering, tag resolution (creating
/// missing tags), create-only defaults, and the per-credential rate gate.
/// Never retries on its own.
pub struct EntryWriter<C, D> {
    entries: Arc<C>,
    directory: Arc<D>,
    resolver: ReferenceResolver<D>,
    workspace: WorkspaceId,
    user: UserId,
    zone: String,
    limiter: Arc<RateLimiter>,
    credential_key: String,
}

impl<C: TimeEntryClient, D: DirectoryClient> EntryWriter<C, D> {
    pub fn new(
        entries: Arc<C>,
        directory: Arc<D>,
        workspace: WorkspaceId,
        user: UserId,
        zone: impl Into<String>,
        limiter: Arc<RateLimiter>,
        credential_key: impl Into<String>,
    ) -> Self {
        let resolver = ReferenceResolver::new(Arc::clone(&directory), workspace.clone());
        Self {
            entries,
            directory,
            resolver,
            workspace,
            user,
            zone: zone.into(),
            limiter,
            credential_key: credential_key.into(),
        }
    }

    pub fn resolver(&self) -> &ReferenceResolver<D> {
        &self.resolver
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn gate(&self) -> Result<(), SyncError> {
        let decision = self.limiter.check(&self.credential_key);
        if decision.allowed {
            Ok(())
        } else {
            Err(SyncError::RateLimited {
                reset_at: decision.reset_at,
            })
        }
    }

    fn normalize_start_end(
        &self,
        start: &str,
        end: Option<&str>,
    ) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), SyncError> {
        let start = wall_time::to_instant(start, &self.zone)?;
        let end = end
            .map(|raw| wall_time::to_instant(raw, &self.zone))
            .transpose()?;

        // Checked after normalization: zone conversion across a DST
        // fallback can reorder a pair that looked valid as wall clock.
        if let Some(end) = end {
            if start >= end {
                return Err(SyncError::TimeOrdering { start, end });
            }
        }
        Ok((start, end))
    }

    /// Turn a tag field into ids, creating missing tags exactly once.
    async fn tag_ids_for(&self, tags: &TagsRef) -> Result<Vec<TagId>, SyncError> {
        let names = match tags {
            TagsRef::Ids(ids) => return Ok(ids.clone()),
            TagsRef::Names(names) if names.is_empty() => return Ok(Vec::new()),
            TagsRef::Names(names) => names,
        };

        let resolution = self.resolver.resolve_tags(names).await?;
        let created = if resolution.missing.is_empty() {
            Vec::new()
        } else {
            self.resolver.create_missing_tags(&resolution.missing).await?
        };

        let by_name: HashMap<String, &str> = resolution
            .existing
            .iter()
            .chain(created.iter())
            .map(|r| (r.name.trim().to_lowercase(), r.id.as_str()))
            .collect();

        let mut ids = Vec::new();
        for name in names {
            let canonical = name.trim().to_lowercase();
            if canonical.is_empty() {
                continue;
            }
            let id = by_name
                .get(&canonical)
                .ok_or_else(|| SyncError::unresolved(RefKind::Tag, name.clone()))?;
            let id = TagId::from(*id);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub async fn create(&self, req: &WriteRequest) -> Result<RemoteEntry, SyncError> {
        let (start, end) = self.normalize_start_end(&req.start, req.end.as_deref())?;
        let tag_ids = self.tag_ids_for(&req.tags).await?;

        let draft = EntryDraft {
            description: req.description.clone(),
            start,
            end,
            project_id: req.project_id.clone(),
            task_id: req.task_id.clone(),
            tag_ids,
            // Default applies to brand-new entries only, and never
            // overrides an explicit value.
            billable: req.billable.unwrap_or(false),
        };

        self.gate()?;
        self.entries.create_entry(&self.workspace, &draft).await
    }

    pub async fn update(
        &self,
        entry: &EntryId,
        req: &PatchRequest,
    ) -> Result<RemoteEntry, SyncError> {
        let patch = self.build_patch(req).await?;
        self.gate()?;
        self.entries
            .update_entry(&self.workspace, entry, &patch)
            .await
    }

    /// One remote call patching many pre-existing entries.
    pub async fn bulk_update(
        &self,
        requests: Vec<(EntryId, PatchRequest)>,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let mut patches = Vec::with_capacity(requests.len());
        for (id, req) in &requests {
            patches.push((id.clone(), self.build_patch(req).await?));
        }

        self.gate()?;
        self.entries
            .bulk_update_entries(&self.workspace, &self.user, &patches)
            .await
    }

    pub async fn delete_one(&self, entry: &EntryId) -> Result<(), SyncError> {
        self.gate()?;
        self.entries.delete_entry(&self.workspace, entry).await
    }

    /// Batched delete of many entries; partial failure is expected and
    /// reported, never thrown.
    pub async fn delete_many(
        &self,
        entries: Vec<EntryId>,
        policy: BatchPolicy,
        on_progress: Option<&mut (dyn FnMut(crate::domain::models::Progress) + Send)>,
    ) -> BatchOutcome<EntryId> {
        run_batched(
            entries,
            policy,
            |id| async move {
                self.gate()?;
                self.entries.delete_entry(&self.workspace, &id).await
            },
            on_progress,
        )
        .await
    }

    /// Batched tag deletion, for cleaning up bulk-created tags.
    pub async fn delete_tags_bulk(
        &self,
        tags: Vec<TagId>,
        policy: BatchPolicy,
    ) -> BatchOutcome<TagId> {
        run_batched(
            tags,
            policy,
            |id| async move {
                self.gate()?;
                self.directory.delete_tag(&self.workspace, &id).await
            },
            None,
        )
        .await
    }

    /// Batched task deletion under one project scope. Tasks the upstream
    /// reports as not belonging to that project come back as skipped.
    pub async fn delete_tasks_bulk(
        &self,
        project: &ProjectId,
        tasks: Vec<TaskId>,
        policy: BatchPolicy,
    ) -> BatchOutcome<TaskId> {
        run_batched(
            tasks,
            policy,
            |id| async move {
                self.gate()?;
                self.directory
                    .delete_task(&self.workspace, project, &id)
                    .await
            },
            None,
        )
        .await
    }

    /// Existing entries of the user inside a UTC window, e.g. to seed a
    /// bulk-edit table.
    pub async fn list_window(
        &self,
        window: (DateTime<Utc>, DateTime<Utc>),
        project: Option<&ProjectId>,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        self.gate()?;
        self.entries
            .list_entries(&self.workspace, &self.user, window, project)
            .await
    }

    async fn build_patch(&self, req: &PatchRequest) -> Result<EntryPatch, SyncError> {
        let start = req
            .start
            .as_deref()
            .map(|raw| wall_time::to_instant(raw, &self.zone))
            .transpose()?;
        let end = req
            .end
            .as_deref()
            .map(|raw| wall_time::to_instant(raw, &self.zone))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(SyncError::TimeOrdering { start, end });
            }
        }

        let tag_ids = match &req.tags {
            Some(tags) => Some(self.tag_ids_for(tags).await?),
            None => None,
        };

        Ok(EntryPatch {
            description: req.description.clone(),
            start,
            end,
            project_id: req.project_id.clone(),
            task_id: req.task_id.clone(),
            tag_ids,
            billable: req.billable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitPolicy;
    use crate::testing::{InMemoryDirectory, InMemoryTimeEntries};
    use chrono::TimeZone;

    fn writer(
        entries: InMemoryTimeEntries,
        directory: InMemoryDirectory,
        zone: &str,
        max_requests: u32,
    ) -> EntryWriter<InMemoryTimeEntries, InMemoryDirectory> {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy {
            max_requests,
            window: chrono::Duration::seconds(60),
        }));
        EntryWriter::new(
            Arc::new(entries),
            Arc::new(directory),
            WorkspaceId::from("ws"),
            UserId::from("u1"),
            zone,
            limiter,
            "key-1",
        )
    }

    #[tokio::test]
    async fn create_normalizes_wall_time_in_zone() {
        let entries = InMemoryTimeEntries::new();
        let w = writer(
            entries.clone(),
            InMemoryDirectory::new(),
            "America/New_York",
            60,
        );

        let req = WriteRequest {
            description: Some("standup".to_string()),
            start: "2024-05-01T09:00".to_string(),
            end: Some("2024-05-01T09:30".to_string()),
            ..Default::default()
        };
        let created = w.create(&req).await.unwrap();

        // EDT is UTC-4.
        assert_eq!(
            created.start,
            Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
        );
        assert!(!created.billable);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn create_resolves_tags_and_creates_missing_ones() {
        let directory = InMemoryDirectory::new().with_tags(["meeting"]);
        let entries = InMemoryTimeEntries::new();
        let w = writer(entries.clone(), directory.clone(), "UTC", 60);

        let req = WriteRequest {
            start: "2024-05-01T09:00".to_string(),
            tags: TagsRef::Names(vec!["Meeting".to_string(), "deep work".to_string()]),
            ..Default::default()
        };
        let created = w.create(&req).await.unwrap();

        // "Meeting" matched the existing tag case-insensitively; only
        // "deep work" was created.
        assert_eq!(directory.tag_count(), 2);
        assert_eq!(created.tag_ids.len(), 2);
        assert_eq!(created.tag_ids[0], directory.tag_id("meeting").unwrap());
    }

    #[tokio::test]
    async fn create_rejects_end_before_start() {
        let entries = InMemoryTimeEntries::new();
        let w = writer(entries.clone(), InMemoryDirectory::new(), "UTC", 60);

        let req = WriteRequest {
            start: "2024-05-01T10:00".to_string(),
            end: Some("2024-05-01T09:00".to_string()),
            ..Default::default()
        };
        let err = w.create(&req).await.unwrap_err();
        assert!(matches!(err, SyncError::TimeOrdering { .. }));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn create_surfaces_rate_limit_denial() {
        let entries = InMemoryTimeEntries::new();
        let w = writer(entries.clone(), InMemoryDirectory::new(), "UTC", 1);

        let req = WriteRequest {
            start: "2024-05-01T09:00".to_string(),
            ..Default::default()
        };
        w.create(&req).await.unwrap();
        let err = w.create(&req).await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn update_sends_only_patched_fields() {
        let entries = InMemoryTimeEntries::new();
        let w = writer(entries.clone(), InMemoryDirectory::new(), "UTC", 60);

        let created = w
            .create(&WriteRequest {
                description: Some("draft".to_string()),
                start: "2024-05-01T09:00".to_string(),
                end: Some("2024-05-01T10:00".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = w
            .update(
                &created.id,
                &PatchRequest {
                    description: Some("final".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.description.as_deref(), Some("final"));
        assert_eq!(updated.start, created.start);
        assert_eq!(updated.end, created.end);
    }

    #[tokio::test]
    async fn bulk_update_patches_many_entries_through_one_gate() {
        let workspace = WorkspaceId::from("ws");
        let entries = InMemoryTimeEntries::new();
        let mut ids = Vec::new();
        for (hour, description) in [(8, "first"), (10, "second")] {
            let draft = EntryDraft {
                description: Some(description.to_string()),
                start: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
                end: None,
                project_id: None,
                task_id: None,
                tag_ids: vec![],
                billable: false,
            };
            ids.push(entries.create_entry(&workspace, &draft).await.unwrap().id);
        }

        let w = writer(
            entries.clone(),
            InMemoryDirectory::new(),
            "America/New_York",
            1,
        );
        let updated = w
            .bulk_update(vec![
                (
                    ids[0].clone(),
                    PatchRequest {
                        description: Some("renamed".to_string()),
                        ..Default::default()
                    },
                ),
                (
                    ids[1].clone(),
                    PatchRequest {
                        start: Some("2024-05-01T09:00".to_string()),
                        ..Default::default()
                    },
                ),
            ])
            .await
            .unwrap();

        assert_eq!(updated.len(), 2);
        // Partial patches: untouched fields keep their remote values.
        let first = entries.get(&ids[0]).unwrap();
        assert_eq!(first.description.as_deref(), Some("renamed"));
        assert_eq!(
            first.start,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
        // Naive wall time normalized in the writer's zone (EDT, UTC-4).
        let second = entries.get(&ids[1]).unwrap();
        assert_eq!(
            second.start,
            Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
        );
        assert_eq!(second.description.as_deref(), Some("second"));

        // Both patches went through a single admission; the window of one
        // is now spent.
        let err = w.delete_one(&ids[0]).await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_many_skips_entries_outside_project_scope() {
        let workspace = WorkspaceId::from("ws");
        let entries = InMemoryTimeEntries::new();
        let mut ids = Vec::new();
        for hour in [8, 10, 12] {
            let draft = EntryDraft {
                description: None,
                start: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
                end: None,
                project_id: None,
                task_id: None,
                tag_ids: vec![],
                billable: false,
            };
            ids.push(entries.create_entry(&workspace, &draft).await.unwrap().id);
        }
        let entries = entries.with_delete_error(
            ids[1].clone(),
            SyncError::remote(400, "Time entry doesn't belong to project p1"),
        );

        let w = writer(entries.clone(), InMemoryDirectory::new(), "UTC", 60);
        let outcome = w
            .delete_many(ids.clone(), BatchPolicy::default(), None)
            .await;

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.skipped, vec![ids[1].clone()]);
        assert!(outcome.failed.is_empty());
        assert_eq!(entries.len(), 1);
    }
}
