use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    models::{EntryDraft, EntryId, EntryPatch, ProjectId, RemoteEntry, UserId, WorkspaceId},
    SyncError,
};

/// Outbound port for time entry mutations against the provider.
///
/// Implementations do not retry: a blind retry of a non-idempotent create
/// would duplicate entries, so retry policy stays with the caller.
#[async_trait]
pub trait TimeEntryClient: Send + Sync + 'static {
    /// List a user's entries inside a UTC window, optionally narrowed to
    /// one project.
    async fn list_entries(
        &self,
        workspace: &WorkspaceId,
        user: &UserId,
        window: (DateTime<Utc>, DateTime<Utc>),
        project: Option<&ProjectId>,
    ) -> Result<Vec<RemoteEntry>, SyncError>;

    async fn create_entry(
        &self,
        workspace: &WorkspaceId,
        draft: &EntryDraft,
    ) -> Result<RemoteEntry, SyncError>;

    async fn update_entry(
        &self,
        workspace: &WorkspaceId,
        entry: &EntryId,
        patch: &EntryPatch,
    ) -> Result<RemoteEntry, SyncError>;

    /// One remote call patching many entries of one user.
    async fn bulk_update_entries(
        &self,
        workspace: &WorkspaceId,
        user: &UserId,
        patches: &[(EntryId, EntryPatch)],
    ) -> Result<Vec<RemoteEntry>, SyncError>;

    async fn delete_entry(
        &self,
        workspace: &WorkspaceId,
        entry: &EntryId,
    ) -> Result<(), SyncError>;
}
