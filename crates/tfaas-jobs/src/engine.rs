//! Single-flight job engine
//!
//! One record, one lock. Admission (busy check plus replacement) happens in a
//! single write-locked section, so two racing submissions can never both be
//! admitted. Executors run on their own task and report back through the
//! completion channel; the [`CompletionWorker`] applies each result under the
//! same lock, and only to the job it was dispatched for.

use std::any::Any;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, instrument};

use crate::error::JobError;
use crate::executor::{outcome_of, Executor};
use crate::job::{Job, JobId, JobOutcome, JobRequest, JobStatus};
use crate::metrics::JobMetrics;
use crate::telemetry::JobTelemetry;

const EVENT_BUFFER: usize = 64;

/// Event emitted when the job record changes
#[derive(Clone, Debug)]
pub enum JobEvent {
    /// A submission was admitted and is now running
    Admitted(Job),
    /// A running job reached its terminal status
    Finished(Job),
    /// A completion arrived for a job that is no longer current
    Discarded(JobId),
}

/// Result of one executor run, addressed to the job it was dispatched for
#[derive(Debug)]
pub struct Completion {
    pub job_id: JobId,
    pub outcome: JobOutcome,
}

struct Shared {
    current: RwLock<Option<Job>>,
    events: broadcast::Sender<JobEvent>,
    metrics: Arc<JobMetrics>,
    telemetry: JobTelemetry,
}

/// Handle for submitting and querying jobs
#[derive(Clone)]
pub struct JobEngine {
    shared: Arc<Shared>,
    executor: Arc<dyn Executor>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl JobEngine {
    /// Create an engine and the worker that applies executor results.
    ///
    /// Jobs stay `RUNNING` until the worker is running:
    /// ```ignore
    /// let (engine, worker) = JobEngine::new(executor, metrics);
    /// tokio::spawn(worker.run());
    /// ```
    pub fn new(executor: Arc<dyn Executor>, metrics: Arc<JobMetrics>) -> (Self, CompletionWorker) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let shared = Arc::new(Shared {
            current: RwLock::new(None),
            events,
            metrics,
            telemetry: JobTelemetry::new("tfaas-jobs"),
        });

        let engine = Self {
            shared: Arc::clone(&shared),
            executor,
            completions,
        };
        let worker = CompletionWorker { shared, receiver };

        (engine, worker)
    }

    /// Create an engine and spawn its completion worker on the current runtime
    pub fn spawn(executor: Arc<dyn Executor>, metrics: Arc<JobMetrics>) -> Self {
        let (engine, worker) = Self::new(executor, metrics);
        tokio::spawn(worker.run());
        engine
    }

    /// Submit raw fields; see [`JobEngine::submit_request`].
    pub async fn submit(&self, version: &str, action: &str, path: &str) -> Result<JobId, JobError> {
        match JobRequest::parse(version, action, path) {
            Ok(request) => self.submit_request(request).await,
            Err(e) => {
                debug!(error = %e, "Rejected submission");
                self.shared.metrics.job_rejected(e.reason());
                Err(e)
            }
        }
    }

    /// Admit a job unless one is running, then dispatch it without waiting.
    #[instrument(skip(self, request), fields(action = %request.action, version = %request.version))]
    pub async fn submit_request(&self, request: JobRequest) -> Result<JobId, JobError> {
        let job = {
            let mut current = self.shared.current.write().await;

            let running = current
                .as_ref()
                .filter(|job| job.is_running())
                .map(|job| job.id.clone());
            if let Some(running) = running {
                drop(current);
                let err = JobError::Busy { running };
                debug!(error = %err, "Rejected submission");
                self.shared.metrics.job_rejected(err.reason());
                return Err(err);
            }

            let job = Job::admit(JobId::generate(), &request);
            *current = Some(job.clone());
            // Under the lock so the running gauge follows record order
            self.shared.metrics.job_admitted();
            job
        };

        self.shared.telemetry.job_admitted(&job);
        let _ = self.shared.events.send(JobEvent::Admitted(job.clone()));

        self.dispatch(job.id.clone(), request);
        Ok(job.id)
    }

    /// Run the executor on a background task and report its result.
    fn dispatch(&self, job_id: JobId, request: JobRequest) {
        let executor = Arc::clone(&self.executor);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            // Nested so a panicking executor still produces a completion
            let run = tokio::spawn(async move { executor.execute(&request).await });

            let outcome = match run.await {
                Ok(result) => outcome_of(result),
                Err(e) if e.is_panic() => JobOutcome::failed(format!(
                    "executor panicked: {}",
                    panic_message(e.into_panic())
                )),
                Err(e) => JobOutcome::failed(format!("executor task aborted: {}", e)),
            };

            if completions.send(Completion { job_id, outcome }).is_err() {
                error!("Completion worker stopped; job result dropped");
            }
        });
    }

    /// Snapshot of the job with this id, if it is the current one
    pub async fn status(&self, job_id: &str) -> Option<Job> {
        let current = self.shared.current.read().await;
        current
            .as_ref()
            .filter(|job| job.id.as_str() == job_id)
            .cloned()
    }

    /// Snapshot of the current job, whatever its id
    pub async fn current(&self) -> Option<Job> {
        self.shared.current.read().await.clone()
    }

    pub async fn is_busy(&self) -> bool {
        self.shared
            .current
            .read()
            .await
            .as_ref()
            .is_some_and(Job::is_running)
    }

    /// Wait until the job reaches a terminal status.
    ///
    /// Returns None if the id is unknown or the job has been superseded.
    pub async fn wait(&self, job_id: &JobId) -> Option<Job> {
        let mut events = self.subscribe();
        loop {
            let job = self.status(job_id.as_str()).await?;
            if job.status.is_terminal() {
                return Some(job);
            }

            match events.recv().await {
                Ok(JobEvent::Finished(job)) if &job.id == job_id => return Some(job),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return self.status(job_id.as_str()).await,
            }
        }
    }

    /// Subscribe to job events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<JobMetrics> {
        Arc::clone(&self.shared.metrics)
    }
}

/// Applies executor completions to the job record
pub struct CompletionWorker {
    shared: Arc<Shared>,
    receiver: mpsc::UnboundedReceiver<Completion>,
}

impl CompletionWorker {
    /// Run until every engine handle and in-flight dispatch is gone
    pub async fn run(mut self) {
        info!("Completion worker started");

        while let Some(completion) = self.receiver.recv().await {
            self.apply(completion).await;
        }

        info!("Completion worker stopped");
    }

    async fn apply(&self, completion: Completion) {
        let Completion { job_id, outcome } = completion;

        let applied = {
            let mut current = self.shared.current.write().await;
            match current.as_mut() {
                Some(job) if job.id == job_id && job.is_running() => {
                    job.finish(outcome);
                    self.shared
                        .metrics
                        .job_finished(job.status == JobStatus::Success, job.duration_ms());
                    Ok(job.clone())
                }
                Some(job) => Err(Some(job.id.clone())),
                None => Err(None),
            }
        };

        match applied {
            Ok(job) => {
                self.shared.telemetry.job_finished(&job);
                let _ = self.shared.events.send(JobEvent::Finished(job));
            }
            Err(current_id) => {
                self.shared
                    .telemetry
                    .completion_discarded(&job_id, current_id.as_ref());
                let _ = self.shared.events.send(JobEvent::Discarded(job_id));
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Action;
    use async_trait::async_trait;

    struct Succeed;

    #[async_trait]
    impl Executor for Succeed {
        async fn execute(&self, _request: &JobRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn engine_with_worker() -> (JobEngine, CompletionWorker) {
        JobEngine::new(Arc::new(Succeed), Arc::new(JobMetrics::new().unwrap()))
    }

    async fn install_running(engine: &JobEngine) -> JobId {
        let request = JobRequest::new("1.4.0", Action::Apply, "envs/prod").unwrap();
        let job = Job::admit(JobId::generate(), &request);
        let id = job.id.clone();
        *engine.shared.current.write().await = Some(job);
        id
    }

    #[tokio::test]
    async fn test_completion_for_current_job_is_applied() {
        let (engine, worker) = engine_with_worker();
        let id = install_running(&engine).await;

        worker
            .apply(Completion {
                job_id: id.clone(),
                outcome: JobOutcome::Failed("invalid configuration".into()),
            })
            .await;

        let job = engine.status(id.as_str()).await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.failure, "invalid configuration");
    }

    #[tokio::test]
    async fn test_stale_completion_does_not_touch_newer_job() {
        let (engine, worker) = engine_with_worker();
        let mut events = engine.subscribe();
        let current = install_running(&engine).await;
        let stale = JobId::generate();

        worker
            .apply(Completion {
                job_id: stale.clone(),
                outcome: JobOutcome::Succeeded,
            })
            .await;

        let job = engine.status(current.as_str()).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.failure.is_empty());
        assert!(matches!(events.recv().await.unwrap(), JobEvent::Discarded(id) if id == stale));
    }

    #[tokio::test]
    async fn test_second_completion_for_same_job_is_ignored() {
        let (engine, worker) = engine_with_worker();
        let id = install_running(&engine).await;

        worker
            .apply(Completion {
                job_id: id.clone(),
                outcome: JobOutcome::Succeeded,
            })
            .await;
        worker
            .apply(Completion {
                job_id: id.clone(),
                outcome: JobOutcome::Failed("late".into()),
            })
            .await;

        let job = engine.status(id.as_str()).await.unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.failure.is_empty());
    }

    #[tokio::test]
    async fn test_completion_with_no_job_is_ignored() {
        let (engine, worker) = engine_with_worker();
        worker
            .apply(Completion {
                job_id: JobId::generate(),
                outcome: JobOutcome::Succeeded,
            })
            .await;
        assert!(engine.current().await.is_none());
    }

    #[tokio::test]
    async fn test_running_gauge_tracks_current_job() {
        let (engine, mut worker) = engine_with_worker();
        let running = |text: &str, value: u8| text.contains(&format!("tfaas_job_running {}", value));

        let first = engine.submit("1.4.0", "apply", "envs/prod").await.unwrap();
        assert!(running(&engine.metrics().render().unwrap(), 1));

        let completion = worker.receiver.recv().await.unwrap();
        assert_eq!(completion.job_id, first);
        worker.apply(completion).await;
        assert!(running(&engine.metrics().render().unwrap(), 0));

        engine.submit("1.4.0", "destroy", "envs/prod").await.unwrap();

        // A late duplicate for the first job must not reset the gauge
        worker
            .apply(Completion {
                job_id: first,
                outcome: JobOutcome::Succeeded,
            })
            .await;
        assert!(running(&engine.metrics().render().unwrap(), 1));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }
}
