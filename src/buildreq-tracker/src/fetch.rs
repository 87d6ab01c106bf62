//! Task retrieval from the tracker.
//!
//! [`TaskSource`] is the seam between the pipelines and the tracker API.
//! [`AsanaClient`] is the HTTP implementation; tests plug in an in-memory
//! source instead.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::model::{RawTask, TaskField};
use crate::window::{format_window, window_start};

/// Page size requested from the tracker.
const PAGE_LIMIT: u32 = 100;

/// Parameters of a task list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    /// Project to list.
    pub project_id: String,
    /// Only tasks completed on or after this date (`YYYY-MM-DD`), plus all
    /// incomplete tasks.
    pub completed_since: String,
    /// Field projection; `None` asks for the tracker's default fields.
    pub fields: Option<Vec<TaskField>>,
}

/// Source of raw tasks.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// List all tasks matching the query, across every page.
    async fn list_tasks(&self, query: &TaskQuery) -> TrackerResult<Vec<RawTask>>;

    /// Fetch a single task by id.
    async fn get_task(&self, gid: &str, fields: Option<&[TaskField]>) -> TrackerResult<RawTask>;
}

/// Envelope of every tracker response.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    offset: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    message: String,
}

/// HTTP client for the Asana REST API.
#[derive(Clone)]
pub struct AsanaClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl std::fmt::Debug for AsanaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsanaClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AsanaClient {
    /// Create a client from configuration.
    pub fn new(config: &TrackerConfig) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: SecretString::new(config.access_token().into()),
        })
    }

    /// GET a tracker resource and decode its envelope.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> TrackerResult<DataEnvelope<T>> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.errors.into_iter().next())
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            warn!("Tracker request to {} failed: {} {}", path, status, detail);
            return Err(TrackerError::UpstreamUnavailable(format!(
                "{}: {}",
                status, detail
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TaskSource for AsanaClient {
    async fn list_tasks(&self, query: &TaskQuery) -> TrackerResult<Vec<RawTask>> {
        let mut params = vec![
            ("project", query.project_id.clone()),
            ("completed_since", query.completed_since.clone()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(fields) = &query.fields {
            params.push(("opt_fields", TaskField::join(fields)));
        }

        let mut tasks = Vec::new();
        let mut offset: Option<String> = None;
        let mut seen_offsets = HashSet::new();

        loop {
            let mut page_params = params.clone();
            if let Some(offset) = &offset {
                page_params.push(("offset", offset.clone()));
            }

            let page: DataEnvelope<Vec<RawTask>> = self.get_json("tasks", &page_params).await?;
            tasks.extend(page.data);

            match page.next_page {
                Some(next) if !seen_offsets.insert(next.offset.clone()) => {
                    warn!(offset = %next.offset, "Tracker repeated a page offset, stopping");
                    break;
                }
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }

        debug!(
            project = %query.project_id,
            count = tasks.len(),
            "Listed tasks"
        );
        Ok(tasks)
    }

    async fn get_task(&self, gid: &str, fields: Option<&[TaskField]>) -> TrackerResult<RawTask> {
        if !is_task_id(gid) {
            return Err(TrackerError::InvalidTaskId(gid.to_string()));
        }

        let mut params = Vec::new();
        if let Some(fields) = fields {
            params.push(("opt_fields", TaskField::join(fields)));
        }

        let envelope: DataEnvelope<RawTask> =
            self.get_json(&format!("tasks/{}", gid), &params).await?;
        Ok(envelope.data)
    }
}

/// Whether `gid` has the shape of a tracker gid.
pub fn is_task_id(gid: &str) -> bool {
    !gid.is_empty() && gid.bytes().all(|b| b.is_ascii_digit())
}

/// Lists a project's tasks inside the completion window.
#[derive(Clone)]
pub struct TaskFetcher {
    source: Arc<dyn TaskSource>,
    today: Option<NaiveDate>,
}

impl TaskFetcher {
    pub fn new(source: Arc<dyn TaskSource>) -> Self {
        Self {
            source,
            today: None,
        }
    }

    /// Compute the window from a fixed date instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Build the query for a project and window.
    pub fn query(
        &self,
        project_id: &str,
        days_back: u32,
        fields: Option<&[TaskField]>,
    ) -> TaskQuery {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        TaskQuery {
            project_id: project_id.to_string(),
            completed_since: format_window(window_start(today, days_back)),
            fields: fields.map(<[TaskField]>::to_vec),
        }
    }

    /// Fetch tasks in `project_id` completed within the last `days_back`
    /// days, plus all incomplete ones.
    pub async fn fetch(
        &self,
        project_id: &str,
        days_back: u32,
        fields: Option<&[TaskField]>,
    ) -> TrackerResult<Vec<RawTask>> {
        let query = self.query(project_id, days_back, fields);
        self.source.list_tasks(&query).await
    }

    /// Fetch a single task again by id.
    pub async fn refetch(&self, gid: &str, fields: Option<&[TaskField]>) -> TrackerResult<RawTask> {
        self.source.get_task(gid, fields).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> AsanaClient {
        let config = TrackerConfig::new("test-pat", "555").with_base_url(server.uri());
        AsanaClient::new(&config).unwrap()
    }

    fn query() -> TaskQuery {
        TaskQuery {
            project_id: "555".to_string(),
            completed_since: "2023-11-02".to_string(),
            fields: Some(TaskField::FULL_PROJECTION.to_vec()),
        }
    }

    #[test]
    fn test_query_uses_window() {
        struct Never;

        #[async_trait]
        impl TaskSource for Never {
            async fn list_tasks(&self, _: &TaskQuery) -> TrackerResult<Vec<RawTask>> {
                unreachable!()
            }
            async fn get_task(&self, _: &str, _: Option<&[TaskField]>) -> TrackerResult<RawTask> {
                unreachable!()
            }
        }

        let fetcher = TaskFetcher::new(Arc::new(Never))
            .with_today(NaiveDate::from_ymd_opt(2023, 11, 16).unwrap());
        let query = fetcher.query("555", 14, None);
        assert_eq!(query.completed_since, "2023-11-02");
        assert_eq!(query.fields, None);
    }

    #[tokio::test]
    async fn test_list_tasks_sends_query_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(header("Authorization", "Bearer test-pat"))
            .and(query_param("project", "555"))
            .and(query_param("completed_since", "2023-11-02"))
            .and(query_param(
                "opt_fields",
                "name,assignee.name,due_on,custom_fields.name,custom_fields.display_value,memberships.section.name,completed_at",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"gid": "1", "name": "Acme Corp"},
                    {"gid": "2", "name": "Globex"}
                ],
                "next_page": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tasks = client_for(&server).list_tasks(&query()).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].name, "Globex");
    }

    #[tokio::test]
    async fn test_list_tasks_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(query_param("offset", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "3", "name": "Initech"}],
                "next_page": null
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "1", "name": "Acme"}, {"gid": "2", "name": "Globex"}],
                "next_page": {"offset": "page-2", "path": "/tasks?offset=page-2"}
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let tasks = client_for(&server).list_tasks(&query()).await.unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Globex", "Initech"]);
    }

    #[tokio::test]
    async fn test_list_tasks_auth_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "errors": [{"message": "Not Authorized"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).list_tasks(&query()).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Not Authorized"));
    }

    #[tokio::test]
    async fn test_list_tasks_garbage_body_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>", "text/html"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_tasks(&query()).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_unreachable_tracker_is_upstream_error() {
        let config = TrackerConfig::new("pat", "1").with_base_url("http://127.0.0.1:1");
        let client = AsanaClient::new(&config).unwrap();
        let err = client.list_tasks(&query()).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_get_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/1201"))
            .and(query_param("opt_fields", "name,due_on"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"gid": "1201", "name": "Acme Corp", "due_on": "2023-11-02"}
            })))
            .mount(&server)
            .await;

        let task = client_for(&server)
            .get_task("1201", Some(&[TaskField::Name, TaskField::DueOn]))
            .await
            .unwrap();
        assert_eq!(task.gid, "1201");
        assert_eq!(task.due_on.as_deref(), Some("2023-11-02"));
    }

    #[tokio::test]
    async fn test_get_task_rejects_non_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for gid in ["123?opt_fields=notes", "../projects/9", ""] {
            let err = client.get_task(gid, None).await.unwrap_err();
            assert!(matches!(err, TrackerError::InvalidTaskId(ref id) if id == gid));
        }
    }

    #[test]
    fn test_is_task_id() {
        assert!(is_task_id("1201"));
        assert!(!is_task_id(""));
        assert!(!is_task_id("12a"));
        assert!(!is_task_id("１２"));
    }

    #[tokio::test]
    async fn test_list_tasks_stops_on_repeated_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(query_param("offset", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "3", "name": "Initech"}],
                "next_page": {"offset": "page-2", "path": "/tasks?offset=page-2"}
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "1", "name": "Acme"}],
                "next_page": {"offset": "page-2", "path": "/tasks?offset=page-2"}
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let tasks = client_for(&server).list_tasks(&query()).await.unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Initech"]);
    }
}
