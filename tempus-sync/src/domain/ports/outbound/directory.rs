use async_trait::async_trait;

use crate::domain::{
    models::{ProjectId, Reference, TagId, TaskId, WorkspaceId},
    SyncError,
};

/// Outbound port for the remote reference directory: the workspace's
/// projects, tasks, and tags.
///
/// Listing order is whatever the provider returns; resolvers that break
/// name ties by "first match" inherit that ordering as-is.
#[async_trait]
pub trait DirectoryClient: Send + Sync + 'static {
    async fn list_projects(&self, workspace: &WorkspaceId)
        -> Result<Vec<Reference>, SyncError>;

    async fn create_project(
        &self,
        workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError>;

    /// Tasks are scoped to their owning project.
    async fn list_tasks(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
    ) -> Result<Vec<Reference>, SyncError>;

    async fn create_task(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
        name: &str,
    ) -> Result<Reference, SyncError>;

    async fn delete_task(
        &self,
        workspace: &WorkspaceId,
        project: &ProjectId,
        task: &TaskId,
    ) -> Result<(), SyncError>;

    async fn list_tags(&self, workspace: &WorkspaceId) -> Result<Vec<Reference>, SyncError>;

    async fn create_tag(
        &self,
        workspace: &WorkspaceId,
        name: &str,
    ) -> Result<Reference, SyncError>;

    async fn delete_tag(&self, workspace: &WorkspaceId, tag: &TagId) -> Result<(), SyncError>;
}
