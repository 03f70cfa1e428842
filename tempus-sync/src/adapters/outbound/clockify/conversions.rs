use crate::domain::models::{
    EntryDraft, EntryId, EntryPatch, ProjectId, Reference, RemoteEntry, TagId, TaskId, UserId,
};

/// Convert a Clockify Project to a directory Reference.
pub fn to_project_reference(project: clockify::domain::Project) -> Reference {
    Reference::new(project.id, project.name)
}

/// Convert a Clockify Task to a directory Reference carrying its project.
pub fn to_task_reference(task: clockify::domain::Task) -> Reference {
    let reference = Reference::new(task.id, task.name);
    match task.project_id {
        Some(project_id) => reference.with_parent(project_id),
        None => reference,
    }
}

/// Convert a Clockify Tag to a directory Reference.
pub fn to_tag_reference(tag: clockify::domain::Tag) -> Reference {
    Reference::new(tag.id, tag.name)
}

/// Flatten a Clockify TimeEntry (nested `timeInterval`) into a RemoteEntry.
pub fn to_remote_entry(entry: clockify::domain::TimeEntry) -> RemoteEntry {
    RemoteEntry {
        id: EntryId::from(entry.id),
        description: entry.description,
        start: entry.time_interval.start,
        end: entry.time_interval.end,
        project_id: entry.project_id.map(ProjectId::from),
        task_id: entry.task_id.map(TaskId::from),
        tag_ids: entry
            .tag_ids
            .unwrap_or_default()
            .into_iter()
            .map(TagId::from)
            .collect(),
        billable: entry.billable,
        user_id: entry.user_id.map(UserId::from),
    }
}

/// Build the creation payload. Clockify wants an explicit `type` marker on
/// manually created entries.
pub fn to_new_time_entry(draft: &EntryDraft) -> clockify::domain::NewTimeEntry {
    clockify::domain::NewTimeEntry {
        start: draft.start,
        end: draft.end,
        description: draft.description.clone(),
        project_id: draft.project_id.as_ref().map(|p| p.as_str().to_string()),
        task_id: draft.task_id.as_ref().map(|t| t.as_str().to_string()),
        tag_ids: if draft.tag_ids.is_empty() {
            None
        } else {
            Some(draft.tag_ids.iter().map(|t| t.as_str().to_string()).collect())
        },
        billable: draft.billable,
        entry_type: clockify::domain::REGULAR_ENTRY_TYPE.to_string(),
    }
}

/// Build the partial update payload; absent fields stay untouched upstream.
pub fn to_update_time_entry(patch: &EntryPatch) -> clockify::domain::UpdateTimeEntry {
    clockify::domain::UpdateTimeEntry {
        start: patch.start,
        end: patch.end,
        description: patch.description.clone(),
        project_id: patch.project_id.as_ref().map(|p| p.as_str().to_string()),
        task_id: patch.task_id.as_ref().map(|t| t.as_str().to_string()),
        tag_ids: patch
            .tag_ids
            .as_ref()
            .map(|tags| tags.iter().map(|t| t.as_str().to_string()).collect()),
        billable: patch.billable,
    }
}

pub fn to_bulk_updates(
    patches: &[(EntryId, EntryPatch)],
) -> Vec<clockify::domain::BulkTimeEntryUpdate> {
    patches
        .iter()
        .map(|(id, patch)| clockify::domain::BulkTimeEntryUpdate {
            id: id.as_str().to_string(),
            patch: to_update_time_entry(patch),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn new_entry_carries_regular_type_marker() {
        let draft = EntryDraft {
            description: None,
            start: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            end: None,
            project_id: None,
            task_id: None,
            tag_ids: vec![],
            billable: false,
        };
        let payload = to_new_time_entry(&draft);
        assert_eq!(payload.entry_type, "REGULAR");
        assert!(payload.tag_ids.is_none());
    }

    #[test]
    fn empty_patch_maps_to_empty_update() {
        let update = to_update_time_entry(&EntryPatch::default());
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn remote_entry_flattens_interval() {
        let entry: clockify::domain::TimeEntry = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "projectId": "p1",
            "tagIds": ["g1", "g2"],
            "billable": true,
            "timeInterval": {
                "start": "2024-05-01T08:00:00Z",
                "end": "2024-05-01T09:00:00Z"
            }
        }))
        .unwrap();

        let remote = to_remote_entry(entry);
        assert_eq!(remote.id.as_str(), "e1");
        assert_eq!(remote.project_id.unwrap().as_str(), "p1");
        assert_eq!(remote.tag_ids.len(), 2);
        assert_eq!(
            remote.start,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
        assert!(remote.end.is_some());
    }
}
