use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{
    models::{ProjectId, Reference, Resolution, WorkspaceId},
    ports::outbound::DirectoryClient,
    SyncError,
};

/// Resolves human-entered project/task/tag names to stable remote ids.
///
/// Matching is whitespace-trimmed, case-insensitive and exact, never fuzzy:
/// an ambiguous name is the operator's call, not a guess. The remote
/// service keeps names unique per scope by convention only, so duplicates
/// are tolerated; the first match in listing order wins
/// (implementation-defined, the upstream API does not document ordering
/// stability).
pub struct ReferenceResolver<D> {
    directory: Arc<D>,
    workspace: WorkspaceId,
}

impl<D: DirectoryClient> ReferenceResolver<D> {
    pub fn new(directory: Arc<D>, workspace: WorkspaceId) -> Self {
        Self {
            directory,
            workspace,
        }
    }

    pub async fn resolve_projects(&self, names: &[String]) -> Result<Resolution, SyncError> {
        let listing = self.directory.list_projects(&self.workspace).await?;
        Ok(match_names(names, &listing))
    }

    pub async fn resolve_tags(&self, names: &[String]) -> Result<Resolution, SyncError> {
        let listing = self.directory.list_tags(&self.workspace).await?;
        Ok(match_names(names, &listing))
    }

    /// Task names only resolve under a project scope; callers with a row
    /// whose project is itself unresolved must defer instead of guessing.
    pub async fn resolve_tasks(
        &self,
        project: &ProjectId,
        names: &[String],
    ) -> Result<Resolution, SyncError> {
        let listing = self.directory.list_tasks(&self.workspace, project).await?;
        Ok(match_names(names, &listing))
    }

    /// Create one project per name, in input order, sequentially.
    ///
    /// Idempotence under retry is the caller's protocol: after a partial
    /// failure, re-run `resolve_projects` to learn what now exists rather
    /// than assuming all-or-nothing semantics upstream.
    pub async fn create_missing_projects(
        &self,
        names: &[String],
    ) -> Result<Vec<Reference>, SyncError> {
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let reference = self
                .directory
                .create_project(&self.workspace, name.trim())
                .await?;
            tracing::info!("created project {:?} ({})", reference.name, reference.id);
            created.push(reference);
        }
        Ok(created)
    }

    pub async fn create_missing_tasks(
        &self,
        project: &ProjectId,
        names: &[String],
    ) -> Result<Vec<Reference>, SyncError> {
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let reference = self
                .directory
                .create_task(&self.workspace, project, name.trim())
                .await?;
            tracing::info!(
                "created task {:?} ({}) under project {}",
                reference.name,
                reference.id,
                project
            );
            created.push(reference);
        }
        Ok(created)
    }

    pub async fn create_missing_tags(&self, names: &[String]) -> Result<Vec<Reference>, SyncError> {
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let reference = self.directory.create_tag(&self.workspace, name.trim()).await?;
            tracing::info!("created tag {:?} ({})", reference.name, reference.id);
            created.push(reference);
        }
        Ok(created)
    }
}

/// Match requested names against a remote listing. Requested names are
/// de-duplicated case-insensitively, preserving first-seen order and
/// spelling; each resolves to the first listing entry with the same
/// canonical name.
fn match_names(names: &[String], listing: &[Reference]) -> Resolution {
    let mut seen = HashSet::new();
    let mut resolution = Resolution::default();

    for name in names {
        let canonical = canon(name);
        if canonical.is_empty() || !seen.insert(canonical.clone()) {
            continue;
        }

        match listing.iter().find(|r| canon(&r.name) == canonical) {
            Some(reference) => resolution.existing.push(reference.clone()),
            None => resolution.missing.push(name.trim().to_string()),
        }
    }

    resolution
}

fn canon(name: &str) -> String {
    name.trim().to_lowercase()
}
