use tracing::{info, instrument, warn};

use crate::job::{Job, JobId, JobStatus};

/// Structured log events for the job lifecycle
pub struct JobTelemetry {
    service_name: String,
}

impl JobTelemetry {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    #[instrument(skip(self, job), fields(
        job_id = %job.id,
        action = %job.action,
        version = %job.version,
        path = %job.path,
        service = %self.service_name
    ))]
    pub fn job_admitted(&self, job: &Job) {
        info!("Job admitted");
    }

    #[instrument(skip(self, job), fields(
        job_id = %job.id,
        action = %job.action,
        status = %job.status,
        duration_ms = job.duration_ms().unwrap_or_default(),
        service = %self.service_name
    ))]
    pub fn job_finished(&self, job: &Job) {
        if job.status == JobStatus::Success {
            info!("Job finished successfully");
        } else {
            warn!(failure = %job.failure, "Job failed");
        }
    }

    #[instrument(skip(self), fields(service = %self.service_name))]
    pub fn completion_discarded(&self, job_id: &JobId, current: Option<&JobId>) {
        warn!(
            job_id = %job_id,
            current = ?current.map(JobId::as_str),
            "Discarding completion for a job that is no longer current"
        );
    }
}
