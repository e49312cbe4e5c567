use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::JobError;

/// Failure detail recorded when an executor fails without a message
pub const UNKNOWN_FAILURE: &str = "execution failed";

/// Opaque job identifier handed back to clients
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Provisioning operation requested by a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create or update infrastructure
    Apply,
    /// Tear infrastructure down
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Apply => "apply",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Action::Apply),
            "destroy" => Ok(Action::Destroy),
            other => Err(JobError::bad_request(format!("unknown action '{}'", other))),
        }
    }
}

/// Lifecycle status of a job
///
/// There is no "idle" variant: an engine that has never admitted a job has
/// no job at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// A validated submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub version: String,
    pub action: Action,
    pub path: String,
}

impl JobRequest {
    pub fn new(
        version: impl Into<String>,
        action: Action,
        path: impl Into<String>,
    ) -> Result<Self, JobError> {
        let version = version.into();
        let path = path.into();

        if version.is_empty() {
            return Err(JobError::bad_request("version is required"));
        }
        if path.is_empty() {
            return Err(JobError::bad_request("path is required"));
        }

        Ok(Self {
            version,
            action,
            path,
        })
    }

    /// Validate raw submission fields
    pub fn parse(version: &str, action: &str, path: &str) -> Result<Self, JobError> {
        let action = action.parse()?;
        Self::new(version, action, path)
    }
}

/// Result reported by an executor for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

impl JobOutcome {
    pub fn failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if detail.is_empty() {
            JobOutcome::Failed(UNKNOWN_FAILURE.to_string())
        } else {
            JobOutcome::Failed(detail)
        }
    }
}

/// The current (or last) job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub version: String,
    pub action: Action,
    pub path: String,
    pub status: JobStatus,
    /// Non-empty exactly when `status` is `Error`
    pub failure: String,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a running job for an admitted request
    pub fn admit(id: JobId, request: &JobRequest) -> Self {
        Self {
            id,
            version: request.version.clone(),
            action: request.action,
            path: request.path.clone(),
            status: JobStatus::Running,
            failure: String::new(),
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Move a running job to its terminal status.
    ///
    /// `status` and `failure` change together; callers hold the state lock.
    pub fn finish(&mut self, outcome: JobOutcome) {
        debug_assert!(self.is_running(), "terminal jobs are never finished twice");
        match outcome {
            JobOutcome::Succeeded => {
                self.status = JobStatus::Success;
                self.failure.clear();
            }
            JobOutcome::Failed(detail) => {
                self.status = JobStatus::Error;
                self.failure = if detail.is_empty() {
                    UNKNOWN_FAILURE.to_string()
                } else {
                    detail
                };
            }
        }
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time between admission and completion
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.submitted_at).num_milliseconds().max(0) as u64)
    }
}
