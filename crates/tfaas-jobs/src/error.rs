use thiserror::Error;

use crate::job::JobId;

/// Synchronous submission errors
///
/// Executor failures never appear here; they are recorded on the job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("busy: job {running} is still running")]
    Busy { running: JobId },
}

impl JobError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        JobError::BadRequest(msg.into())
    }

    /// Label used for the rejection metric
    pub fn reason(&self) -> &'static str {
        match self {
            JobError::BadRequest(_) => "bad_request",
            JobError::Busy { .. } => "busy",
        }
    }
}
