mod conversions;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    models::{
        EntryDraft, EntryId, EntryPatch, ProjectId, Reference, RemoteEntry, TagId, TaskId, UserId,
        WorkspaceId,
    },
    ports::outbound::{DirectoryClient, TimeEntryClient},
    SyncError,
};

use self::conversions::{
    to_bulk_updates, to_new_time_entry, to_project_reference, to_remote_entry, to_tag_reference,
    to_task_reference, to_update_time_entry,
};

/// Adapter that wraps the Clockify client to implement the directory and
/// time entry ports.
pub struct ClockifyAdapter {
    client: clockify::ClockifyClient,
}

impl ClockifyAdapter {
    pub fn new(credentials: clockify::Credentials) -> Self {
        Self {
            client: clockify::ClockifyClient::new(credentials),
        }
    }

    pub fn from_client(client: clockify::ClockifyClient) -> Self {
        Self { client }
    }

    /// The opaque key the wrapped client authenticates with. Rate limit
    /// windows are keyed on this.
    pub fn credential_key(&self) -> &str {
        self.client.credential_key()
    }

    /// The authenticated user's id, needed for user-scoped endpoints.
    pub async fn current_user_id(&self) -> Result<UserId, SyncError> {
        let user = self
            .client
            .current_user()
            .await
            .map_err(map_clockify_error)?;
        Ok(UserId::from(user.id))
    }
}

#[async_trait]
impl DirectoryClient for ClockifyAdapter {
    async fn list_projects(&self, workspace: &WorkspaceId) -> Result<Vec<Reference>, SyncError> {
        let projects = self
            .client
            .list_projects(workspace.as_str())
            .await
            .map_err(map_clockify_error)?;
        Ok(projects.into_iter().map(to_project_reference).collect())
    }

    async fn create_project(
        &self,
        workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        let payload = clockify::domain::NewProject::named(name);
        let project = self
            .client
            .create_project(workspace.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(to_project_reference(project))
    }

    async fn list_tasks(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
    ) -> Result<Vec<Reference>, SyncError> {
        let tasks = self
            .client
            .list_tasks(workspace.as_str(), project.as_str())
            .await
            .map_err(map_clockify_error)?;
        Ok(tasks.into_iter().map(to_task_reference).collect())
    }

    async fn create_task(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        let payload = clockify::domain::NewTask::named(name);
        let task = self
            .client
            .create_task(workspace.as_str(), project.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(to_task_reference(task))
    }

    async fn delete_task(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
        task: &TaskId,
    ) -> Result<(), SyncError> {
        self.client
            .delete_task(workspace.as_str(), project.as_str(), task.as_str())
            .await
            .map_err(map_clockify_error)
    }

    async fn list_tags(&self, workspace: &WorkspaceId) -> Result<Vec<Reference>, SyncError> {
        let tags = self
            .client
            .list_tags(workspace.as_str())
            .await
            .map_err(map_clockify_error)?;
        Ok(tags.into_iter().map(to_tag_reference).collect())
    }

    async fn create_tag(
        &self,
        workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError> {
        let payload = clockify::domain::NewTag::named(name);
        let tag = self
            .client
            .create_tag(workspace.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(to_tag_reference(tag))
    }

    async fn delete_tag(&self, workspace: &WorkspaceId, tag: &TagId) -> Result<(), SyncError> {
        self.client
            .delete_tag(workspace.as_str(), tag.as_str())
            .await
            .map_err(map_clockify_error)
    }
}

#[async_trait]
impl TimeEntryClient for ClockifyAdapter {
    async fn list_entries(
        &self,
        workspace: &WorkspaceId,
        user: &UserId,
        window: (DateTime<Utc>, DateTime<Utc>),
        project: Option<&ProjectId>,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let query = clockify::TimeEntryQuery {
            start: Some(window.0),
            end: Some(window.1),
            project_id: project.map(|p| p.as_str().to_string()),
            page: None,
        };
        let entries = self
            .client
            .list_time_entries(workspace.as_str(), user.as_str(), &query)
            .await
            .map_err(map_clockify_error)?;
        Ok(entries.into_iter().map(to_remote_entry).collect())
    }

    async fn create_entry(
        &self,
        workspace: &WorkspaceId,
        draft: &EntryDraft,
    ) -> Result<RemoteEntry, SyncError> {
        let payload = to_new_time_entry(draft);
        let entry = self
            .client
            .create_time_entry(workspace.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(to_remote_entry(entry))
    }

    async fn update_entry(
        &self,
        workspace: &WorkspaceId,
        entry: &EntryId,
        patch: &EntryPatch,
    ) -> Result<RemoteEntry, SyncError> {
        let payload = to_update_time_entry(patch);
        let updated = self
            .client
            .update_time_entry(workspace.as_str(), entry.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(to_remote_entry(updated))
    }

    async fn bulk_update_entries(
        &self,
        workspace: &WorkspaceId,
        user: &UserId,
        patches: &[(EntryId, EntryPatch)],
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let payload = to_bulk_updates(patches);
        let updated = self
            .client
            .bulk_update_time_entries(workspace.as_str(), user.as_str(), &payload)
            .await
            .map_err(map_clockify_error)?;
        Ok(updated.into_iter().map(to_remote_entry).collect())
    }

    async fn delete_entry(
        &self,
        workspace: &WorkspaceId,
        entry: &EntryId,
    ) -> Result<(), SyncError> {
        self.client
            .delete_time_entry(workspace.as_str(), entry.as_str())
            .await
            .map_err(map_clockify_error)
    }
}

fn map_clockify_error(e: clockify::ClockifyError) -> SyncError {
    match e {
        clockify::ClockifyError::Unauthorized => SyncError::remote(401, "unauthorized"),
        clockify::ClockifyError::Api { status, message } => SyncError::remote(status, message),
        // Status 0 marks failures that never reached the API.
        clockify::ClockifyError::Transport(msg) => SyncError::remote(0, msg),
        clockify::ClockifyError::Parsing(msg) => SyncError::remote(0, msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_status_and_message() {
        let err = map_clockify_error(clockify::ClockifyError::Api {
            status: 400,
            message: "Time entry doesn't belong to project p1".to_string(),
        });
        assert!(err.is_scope_mismatch());
    }

    #[test]
    fn transport_errors_map_to_status_zero() {
        let err = map_clockify_error(clockify::ClockifyError::Transport(
            "connection refused".to_string(),
        ));
        match err {
            SyncError::Remote { status, .. } => assert_eq!(status, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
