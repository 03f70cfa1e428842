//! In-memory port implementations for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::{
    models::{
        EntryDraft, EntryId, EntryPatch, ProjectId, Reference, RemoteEntry, TagId, TaskId, UserId,
        WorkspaceId,
    },
    ports::outbound::{DirectoryClient, TimeEntryClient},
    SyncError,
};

/// In-memory directory backed by plain vectors, so listing order is
/// exactly insertion order (name ties resolve to the earliest insert).
///
/// # Examples
///
/// ```
/// use tempus_sync::testing::InMemoryDirectory;
///
/// let directory = InMemoryDirectory::new()
///     .with_projects(["Ops", "Platform"])
///     .with_tags(["meeting"]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    projects: Arc<RwLock<Vec<Reference>>>,
    tasks: Arc<RwLock<HashMap<ProjectId, Vec<Reference>>>>,
    tags: Arc<RwLock<Vec<Reference>>>,
    /// When set, every call fails with this error.
    injected_error: Arc<RwLock<Option<SyncError>>>,
    next_id: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut projects = self.projects.write().unwrap();
            for name in names {
                let id = self.mint_id("p");
                projects.push(Reference::new(id, name.into()));
            }
        }
        self
    }

    pub fn with_tasks<I, S>(self, project: &ProjectId, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut tasks = self.tasks.write().unwrap();
            let bucket = tasks.entry(project.clone()).or_default();
            for name in names {
                let id = self.mint_id("t");
                bucket.push(Reference::new(id, name.into()).with_parent(project.as_str()));
            }
        }
        self
    }

    pub fn with_tags<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut tags = self.tags.write().unwrap();
            for name in names {
                let id = self.mint_id("g");
                tags.push(Reference::new(id, name.into()));
            }
        }
        self
    }

    /// Make every subsequent call fail with `error`.
    pub fn with_error(self, error: SyncError) -> Self {
        *self.injected_error.write().unwrap() = Some(error);
        self
    }

    /// Look up a seeded project's id by exact name (for test setup).
    pub fn project_id(&self, name: &str) -> Option<ProjectId> {
        self.projects
            .read()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .map(|r| ProjectId::from(r.id.as_str()))
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.tags
            .read()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .map(|r| TagId::from(r.id.as_str()))
    }

    pub fn project_count(&self) -> usize {
        self.projects.read().unwrap().len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.read().unwrap().len()
    }

    pub fn task_count(&self, project: &ProjectId) -> usize {
        self.tasks
            .read()
            .unwrap()
            .get(project)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    fn mint_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    fn check_injected(&self) -> Result<(), SyncError> {
        match self.injected_error.read().unwrap().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn list_projects(&self, _workspace: &WorkspaceId) -> Result<Vec<Reference>, SyncError> {
        self.check_injected()?;
        Ok(self.projects.read().unwrap().clone())
    }

    async fn create_project(
        &self,
        _workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        self.check_injected()?;
        let reference = Reference::new(self.mint_id("p"), name);
        self.projects.write().unwrap().push(reference.clone());
        Ok(reference)
    }

    async fn list_tasks(
        &self,
        _workspace: &WorkspaceId,
        project: &ProjectId,
    ) -> Result<Vec<Reference>, SyncError> {
        self.check_injected()?;
        Ok(self
            .tasks
            .read()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_task(
        &self,
        _workspace: &WorkspaceId,
        project: &ProjectId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        self.check_injected()?;
        let reference = Reference::new(self.mint_id("t"), name).with_parent(project.as_str());
        self.tasks
            .write()
            .unwrap()
            .entry(project.clone())
            .or_default()
            .push(reference.clone());
        Ok(reference)
    }

    async fn delete_task(
        &self,
        _workspace: &WorkspaceId,
        project: &ProjectId,
        task: &TaskId,
    ) -> Result<(), SyncError> {
        self.check_injected()?;
        let mut tasks = self.tasks.write().unwrap();
        let bucket = tasks
            .get_mut(project)
            .ok_or_else(|| SyncError::remote(404, "project not found"))?;
        let before = bucket.len();
        bucket.retain(|r| r.id != task.as_str());
        if bucket.len() == before {
            return Err(SyncError::remote(404, "task not found"));
        }
        Ok(())
    }

    async fn list_tags(&self, _workspace: &WorkspaceId) -> Result<Vec<Reference>, SyncError> {
        self.check_injected()?;
        Ok(self.tags.read().unwrap().clone())
    }

    async fn create_tag(
        &self,
        _workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        self.check_injected()?;
        let reference = Reference::new(self.mint_id("g"), name);
        self.tags.write().unwrap().push(reference.clone());
        Ok(reference)
    }

    async fn delete_tag(&self, _workspace: &WorkspaceId, tag: &TagId) -> Result<(), SyncError> {
        self.check_injected()?;
        let mut tags = self.tags.write().unwrap();
        let before = tags.len();
        tags.retain(|r| r.id != tag.as_str());
        if tags.len() == before {
            return Err(SyncError::remote(404, "tag not found"));
        }
        Ok(())
    }
}

/// In-memory time entry store keyed by entry id.
///
/// Per-entry errors can be injected to exercise partial-failure paths,
/// e.g. the scope-mismatch message a provider returns when an entry is
/// deleted through the wrong project.
#[derive(Clone, Default)]
pub struct InMemoryTimeEntries {
    entries: Arc<RwLock<HashMap<EntryId, RemoteEntry>>>,
    deleted: Arc<RwLock<Vec<EntryId>>>,
    delete_errors: Arc<RwLock<HashMap<EntryId, SyncError>>>,
    next_id: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl InMemoryTimeEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(self, entries: Vec<RemoteEntry>) -> Self {
        {
            let mut store = self.entries.write().unwrap();
            for entry in entries {
                store.insert(entry.id.clone(), entry);
            }
        }
        self
    }

    /// Fail deletion of `entry` with `error` instead of removing it.
    pub fn with_delete_error(self, entry: EntryId, error: SyncError) -> Self {
        self.delete_errors.write().unwrap().insert(entry, error);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn get(&self, entry: &EntryId) -> Option<RemoteEntry> {
        self.entries.read().unwrap().get(entry).cloned()
    }

    /// All entries, ordered by start time (for test assertions).
    pub fn all_entries(&self) -> Vec<RemoteEntry> {
        let mut entries: Vec<_> = self.entries.read().unwrap().values().cloned().collect();
        entries.sort_by_key(|e| e.start);
        entries
    }

    /// Ids whose deletion succeeded, in deletion order.
    pub fn deleted_ids(&self) -> Vec<EntryId> {
        self.deleted.read().unwrap().clone()
    }

    fn mint_id(&self) -> EntryId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        EntryId::from(format!("e-{n}"))
    }

    fn apply_patch(entry: &mut RemoteEntry, patch: &EntryPatch) {
        if let Some(description) = &patch.description {
            entry.description = Some(description.clone());
        }
        if let Some(start) = patch.start {
            entry.start = start;
        }
        if let Some(end) = patch.end {
            entry.end = Some(end);
        }
        if let Some(project_id) = &patch.project_id {
            entry.project_id = Some(project_id.clone());
        }
        if let Some(task_id) = &patch.task_id {
            entry.task_id = Some(task_id.clone());
        }
        if let Some(tag_ids) = &patch.tag_ids {
            entry.tag_ids = tag_ids.clone();
        }
        if let Some(billable) = patch.billable {
            entry.billable = billable;
        }
    }
}

#[async_trait]
impl TimeEntryClient for InMemoryTimeEntries {
    async fn list_entries(
        &self,
        _workspace: &WorkspaceId,
        user: &UserId,
        window: (DateTime<Utc>, DateTime<Utc>),
        project: Option<&ProjectId>,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let (from, to) = window;
        let mut entries: Vec<_> = self
            .entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.start >= from && e.start < to)
            .filter(|e| e.user_id.as_ref().map(|u| u == user).unwrap_or(true))
            .filter(|e| match project {
                Some(p) => e.project_id.as_ref() == Some(p),
                None => true,
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.start);
        Ok(entries)
    }

    async fn create_entry(
        &self,
        _workspace: &WorkspaceId,
        draft: &EntryDraft,
    ) -> Result<RemoteEntry, SyncError> {
        let entry = RemoteEntry {
            id: self.mint_id(),
            description: draft.description.clone(),
            start: draft.start,
            end: draft.end,
            project_id: draft.project_id.clone(),
            task_id: draft.task_id.clone(),
            tag_ids: draft.tag_ids.clone(),
            billable: draft.billable,
            user_id: None,
        };
        self.entries
            .write()
            .unwrap()
            .insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn update_entry(
        &self,
        _workspace: &WorkspaceId,
        entry: &EntryId,
        patch: &EntryPatch,
    ) -> Result<RemoteEntry, SyncError> {
        let mut entries = self.entries.write().unwrap();
        let stored = entries
            .get_mut(entry)
            .ok_or_else(|| SyncError::remote(404, "time entry not found"))?;
        Self::apply_patch(stored, patch);
        Ok(stored.clone())
    }

    async fn bulk_update_entries(
        &self,
        _workspace: &WorkspaceId,
        _user: &UserId,
        patches: &[(EntryId, EntryPatch)],
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let mut entries = self.entries.write().unwrap();
        let mut updated = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            let stored = entries
                .get_mut(id)
                .ok_or_else(|| SyncError::remote(404, "time entry not found"))?;
            Self::apply_patch(stored, patch);
            updated.push(stored.clone());
        }
        Ok(updated)
    }

    async fn delete_entry(
        &self,
        _workspace: &WorkspaceId,
        entry: &EntryId,
    ) -> Result<(), SyncError> {
        if let Some(err) = self.delete_errors.read().unwrap().get(entry) {
            return Err(err.clone());
        }
        let removed = self.entries.write().unwrap().remove(entry);
        if removed.is_none() {
            return Err(SyncError::remote(404, "time entry not found"));
        }
        self.deleted.write().unwrap().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(start_hour: u32) -> EntryDraft {
        EntryDraft {
            description: Some("work".to_string()),
            start: Utc.with_ymd_and_hms(2024, 5, 1, start_hour, 0, 0).unwrap(),
            end: Some(Utc.with_ymd_and_hms(2024, 5, 1, start_hour + 1, 0, 0).unwrap()),
            project_id: None,
            task_id: None,
            tag_ids: vec![],
            billable: false,
        }
    }

    #[tokio::test]
    async fn create_and_window_listing() {
        let store = InMemoryTimeEntries::new();
        let workspace = WorkspaceId::from("ws");
        let user = UserId::from("u1");

        store.create_entry(&workspace, &draft(8)).await.unwrap();
        store.create_entry(&workspace, &draft(13)).await.unwrap();

        let window = (
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        );
        let listed = store
            .list_entries(&workspace, &user, window, None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].start.format("%H").to_string(), "08");
    }

    #[tokio::test]
    async fn injected_delete_error_keeps_entry() {
        let workspace = WorkspaceId::from("ws");
        let store = InMemoryTimeEntries::new();
        let created = store.create_entry(&workspace, &draft(9)).await.unwrap();

        let store = store.with_delete_error(
            created.id.clone(),
            SyncError::remote(400, "Entry doesn't belong to project"),
        );

        let err = store.delete_entry(&workspace, &created.id).await.unwrap_err();
        assert!(err.is_scope_mismatch());
        assert_eq!(store.len(), 1);
        assert!(store.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn directory_preserves_insertion_order() {
        let workspace = WorkspaceId::from("ws");
        let directory = InMemoryDirectory::new().with_projects(["Ops", "ops"]);

        let listed = directory.list_projects(&workspace).await.unwrap();
        assert_eq!(listed[0].name, "Ops");
        assert_eq!(listed[1].name, "ops");

        directory.create_project(&workspace, "Platform").await.unwrap();
        assert_eq!(directory.project_count(), 3);
    }
}
