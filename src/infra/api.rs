use crate::domain::{JobNodeRaw, JobPath};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Blocking client for the replication backend's JSON API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, part: &str) -> String {
        format!("{}{part}", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(&self, part: &str) -> Result<T, ApiError> {
        let url = self.url(part);
        let agent = make_agent(self.timeout);
        let mut response = agent.get(&url).call().map_err(|error| ApiError::Request {
            url: url.clone(),
            message: error.to_string(),
        })?;
        response
            .body_mut()
            .read_json::<T>()
            .map_err(|error| ApiError::Decode {
                url,
                message: error.to_string(),
            })
    }

    /// Fire a GET whose response body is not part of the contract.
    fn get_trigger(&self, part: &str) -> Result<(), ApiError> {
        let url = self.url(part);
        let agent = make_agent(self.timeout);
        agent.get(&url).call().map_err(|error| ApiError::Request {
            url,
            message: error.to_string(),
        })?;
        Ok(())
    }

    /// Full hierarchical snapshot plus the server's clock.
    pub fn fetch_all_tasks(&self) -> Result<AllTasksResponse, ApiError> {
        self.get_json("/api/alltasks")
    }

    /// Per-job detail lookup, keyed by the job's path.
    pub fn fetch_task_details(&self, path: &JobPath) -> Result<TaskDetailResponse, ApiError> {
        self.get_json(&format!("/api/taskdetails/{path}"))
    }

    /// Trigger a run of every job. The response is not consumed.
    pub fn start_all(&self) -> Result<(), ApiError> {
        self.get_trigger("/api/startall")
    }

    /// Trigger prep of every job. The response is not consumed.
    pub fn prepare_all(&self) -> Result<(), ApiError> {
        self.get_trigger("/api/prepall")
    }
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    config.into()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTasksResponse {
    pub task: JobNodeRaw,
    pub server_info: ServerInfo,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub unix_time: f64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetailResponse {
    #[serde(default)]
    pub detail_data: DetailData,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetailData {
    #[serde(default)]
    pub snapshot_report: Option<SnapshotReport>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SnapshotReport {
    #[serde(default)]
    pub snapshots: Vec<SnapshotEntry>,
}

/// One snapshot's presence on either end of the replication.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SnapshotEntry {
    pub name: String,
    pub source: Option<SnapshotSide>,
    pub receiver: Option<SnapshotSide>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct SnapshotSide {
    pub pruned: bool,
}

/// How one side of the replication reports a snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnapshotPresence {
    Absent,
    Pruned,
    Kept,
}

impl SnapshotPresence {
    pub fn of(side: Option<&SnapshotSide>) -> Self {
        match side {
            None => Self::Absent,
            Some(side) if side.pruned => Self::Pruned,
            Some(_) => Self::Kept,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Absent => "Absent",
            Self::Pruned => "Pruned",
            Self::Kept => "Kept",
        }
    }
}
