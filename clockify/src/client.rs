use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{
        BulkTimeEntryUpdate, NewProject, NewTag, NewTask, NewTimeEntry, Project, Tag, Task,
        TimeEntry, UpdateTimeEntry, User,
    },
    ClockifyUrl, Credentials,
};

pub struct ClockifyClient {
    http: reqwest::Client,
    credentials: Credentials,
    base_url: ClockifyUrl,
}

impl ClockifyClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, ClockifyUrl::new())
    }

    /// Point the client at a non-default base URL, e.g. a mock server.
    pub fn with_base_url(credentials: Credentials, base_url: ClockifyUrl) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            base_url,
        }
    }

    /// The opaque API key this client authenticates with.
    pub fn credential_key(&self) -> &str {
        self.credentials.key()
    }

    fn url(&self, path: &str) -> ClockifyUrl {
        self.base_url.append_path(path)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: impl AsRef<str>,
    ) -> Result<T, ClockifyError> {
        let resp = self
            .http
            .get(url.as_ref())
            .headers(self.credentials.auth_headers())
            .send()
            .await
            .map_err(|e| ClockifyError::Transport(e.to_string()))?;

        Self::parse_response(resp).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: impl AsRef<str>,
        body: &B,
    ) -> Result<T, ClockifyError> {
        let resp = self
            .http
            .request(method, url.as_ref())
            .headers(self.credentials.auth_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| ClockifyError::Transport(e.to_string()))?;

        Self::parse_response(resp).await
    }

    async fn delete(&self, url: impl AsRef<str>) -> Result<(), ClockifyError> {
        let resp = self
            .http
            .delete(url.as_ref())
            .headers(self.credentials.auth_headers())
            .send()
            .await
            .map_err(|e| ClockifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::status_error(status, resp).await)
    }

    async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClockifyError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::status_error(status, resp).await);
        }

        resp.json::<T>().await.map_err(|e| {
            ClockifyError::Parsing(format!("Failed to parse response as JSON: {}", e))
        })
    }

    async fn status_error(status: reqwest::StatusCode, resp: reqwest::Response) -> ClockifyError {
        if status == 401 || status == 403 {
            return ClockifyError::Unauthorized;
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        tracing::warn!("Clockify API returned {}: {}", status.as_u16(), message);

        ClockifyError::Api {
            status: status.as_u16(),
            message,
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn current_user(&self) -> Result<User, ClockifyError> {
        self.fetch(self.url("/user")).await
    }

    // ------------------------------------------------------------------
    // Directory: projects, tasks, tags
    // ------------------------------------------------------------------

    pub async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>, ClockifyError> {
        let url = self
            .url(&format!("/workspaces/{}/projects", workspace_id))
            .with_param("page-size", "500");
        self.fetch(url).await
    }

    pub async fn create_project(
        &self,
        workspace_id: &str,
        payload: &NewProject,
    ) -> Result<Project, ClockifyError> {
        let url = self.url(&format!("/workspaces/{}/projects", workspace_id));
        self.send_json(reqwest::Method::POST, url, payload).await
    }

    pub async fn list_tasks(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<Task>, ClockifyError> {
        let url = self
            .url(&format!(
                "/workspaces/{}/projects/{}/tasks",
                workspace_id, project_id
            ))
            .with_param("page-size", "500");
        self.fetch(url).await
    }

    pub async fn create_task(
        &self,
        workspace_id: &str,
        project_id: &str,
        payload: &NewTask,
    ) -> Result<Task, ClockifyError> {
        let url = self.url(&format!(
            "/workspaces/{}/projects/{}/tasks",
            workspace_id, project_id
        ));
        self.send_json(reqwest::Method::POST, url, payload).await
    }

    pub async fn delete_task(
        &self,
        workspace_id: &str,
        project_id: &str,
        task_id: &str,
    ) -> Result<(), ClockifyError> {
        let url = self.url(&format!(
            "/workspaces/{}/projects/{}/tasks/{}",
            workspace_id, project_id, task_id
        ));
        self.delete(url).await
    }

    pub async fn list_tags(&self, workspace_id: &str) -> Result<Vec<Tag>, ClockifyError> {
        let url = self
            .url(&format!("/workspaces/{}/tags", workspace_id))
            .with_param("page-size", "500");
        self.fetch(url).await
    }

    pub async fn create_tag(
        &self,
        workspace_id: &str,
        payload: &NewTag,
    ) -> Result<Tag, ClockifyError> {
        let url = self.url(&format!("/workspaces/{}/tags", workspace_id));
        self.send_json(reqwest::Method::POST, url, payload).await
    }

    pub async fn delete_tag(&self, workspace_id: &str, tag_id: &str) -> Result<(), ClockifyError> {
        let url = self.url(&format!("/workspaces/{}/tags/{}", workspace_id, tag_id));
        self.delete(url).await
    }

    // ------------------------------------------------------------------
    // Time entries
    // ------------------------------------------------------------------

    pub async fn list_time_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        query: &TimeEntryQuery,
    ) -> Result<Vec<TimeEntry>, ClockifyError> {
        let mut url = self
            .url(&format!(
                "/workspaces/{}/user/{}/time-entries",
                workspace_id, user_id
            ))
            .with_param("page-size", "200");
        if let Some(page) = query.page {
            url = url.with_param("page", &page.to_string());
        }
        if let Some(start) = query.start {
            url = url.with_param("start", &start.to_rfc3339());
        }
        if let Some(end) = query.end {
            url = url.with_param("end", &end.to_rfc3339());
        }
        if let Some(project_id) = &query.project_id {
            url = url.with_param("project", project_id);
        }

        self.fetch(url).await
    }

    pub async fn create_time_entry(
        &self,
        workspace_id: &str,
        payload: &NewTimeEntry,
    ) -> Result<TimeEntry, ClockifyError> {
        let url = self.url(&format!("/workspaces/{}/time-entries", workspace_id));
        self.send_json(reqwest::Method::POST, url, payload).await
    }

    pub async fn update_time_entry(
        &self,
        workspace_id: &str,
        entry_id: &str,
        payload: &UpdateTimeEntry,
    ) -> Result<TimeEntry, ClockifyError> {
        let url = self.url(&format!(
            "/workspaces/{}/time-entries/{}",
            workspace_id, entry_id
        ));
        self.send_json(reqwest::Method::PUT, url, payload).await
    }

    /// One remote call updating many entries of a user at once.
    pub async fn bulk_update_time_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        payload: &[BulkTimeEntryUpdate],
    ) -> Result<Vec<TimeEntry>, ClockifyError> {
        let url = self.url(&format!(
            "/workspaces/{}/user/{}/time-entries",
            workspace_id, user_id
        ));
        self.send_json(reqwest::Method::PUT, url, payload).await
    }

    pub async fn delete_time_entry(
        &self,
        workspace_id: &str,
        entry_id: &str,
    ) -> Result<(), ClockifyError> {
        let url = self.url(&format!(
            "/workspaces/{}/time-entries/{}",
            workspace_id, entry_id
        ));
        self.delete(url).await
    }
}

/// Filters accepted by the time entry listing endpoint.
#[derive(Debug, Default, Clone)]
pub struct TimeEntryQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    /// 1-based page number; the endpoint defaults to the first page.
    pub page: Option<u32>,
}

#[derive(Error, Debug)]
pub enum ClockifyError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Clockify API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("TransportError: {0}")]
    Transport(String),
    #[error("ParsingError: {0}")]
    Parsing(String),
}

/// Error body shape used by the Clockify API, e.g.
/// `{"message": "TIMEENTRY with id X doesn't exist", "code": 501}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
