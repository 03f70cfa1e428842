use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The entry type marker Clockify expects on manually created entries.
pub const REGULAR_ENTRY_TYPE: &str = "REGULAR";

/// A time entry as returned by the API. Start/end live in the nested
/// `timeInterval` object on reads, while mutation payloads take them flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Option<Vec<String>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub billable: bool,
    pub time_interval: TimeInterval,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    /// `None` while the entry is still running.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Payload for `POST .../time-entries`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    pub billable: bool,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// Partial patch for `PUT .../time-entries/{id}`. Only fields that are
/// `Some` are serialized, so an omitted field keeps its remote value.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
}

/// One element of the bulk edit payload
/// (`PUT /workspaces/{ws}/user/{user}/time-entries` takes an array).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTimeEntryUpdate {
    pub id: String,
    #[serde(flatten)]
    pub patch: UpdateTimeEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn partial_patch_omits_absent_fields() {
        let patch = UpdateTimeEntry {
            description: Some("standup".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "description": "standup" }));
    }

    #[test]
    fn bulk_update_flattens_patch_next_to_id() {
        let update = BulkTimeEntryUpdate {
            id: "e1".to_string(),
            patch: UpdateTimeEntry {
                billable: Some(true),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "e1", "billable": true }));
    }

    #[test]
    fn reads_nested_time_interval() {
        let entry: TimeEntry = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "billable": false,
            "timeInterval": {
                "start": "2024-03-10T07:30:00Z",
                "end": null,
                "duration": null
            }
        }))
        .unwrap();
        assert_eq!(
            entry.time_interval.start,
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()
        );
        assert!(entry.time_interval.end.is_none());
    }
}
