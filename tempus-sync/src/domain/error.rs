use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::RefKind;

/// Errors that can occur while synchronizing time entries upstream.
///
/// Validation variants are row-local: commit and batch loops collect them
/// per row instead of aborting. `Remote` on a directory listing is
/// stage-fatal, since verification cannot proceed without the listing.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("start {start} is not before end {end}")]
    TimeOrdering {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("unresolved {kind}: {name:?}")]
    UnresolvedReference { kind: RefKind, name: String },
    #[error("rate limited, retry at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },
    /// Upstream 4xx/5xx, or transport failure (status 0, the classic
    /// "request never got an HTTP status" convention).
    #[error("remote API error ({status}): {message}")]
    Remote { status: u16, message: String },
    /// An operator drove the intake workflow out of order, e.g. commit
    /// before verification finished.
    #[error("not allowed in stage {stage}: {reason}")]
    StageViolation {
        stage: &'static str,
        reason: String,
    },
}

impl SyncError {
    pub fn unresolved(kind: RefKind, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind,
            name: name.into(),
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Upstream signature for "the object exists but not under the parent
    /// scope the call claimed". Deleting such an item again will never
    /// succeed, so batch runners classify it as skipped, not failed.
    pub fn is_scope_mismatch(&self) -> bool {
        match self {
            Self::Remote { status, message } => {
                (400..500).contains(status)
                    && message.to_lowercase().contains("doesn't belong to")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_mismatch_matches_upstream_signature() {
        let err = SyncError::remote(400, "Task doesn't belong to project PX");
        assert!(err.is_scope_mismatch());

        let other = SyncError::remote(500, "Task doesn't belong to project PX");
        assert!(!other.is_scope_mismatch());

        let unrelated = SyncError::remote(404, "TIMEENTRY not found");
        assert!(!unrelated.is_scope_mismatch());
    }
}
