//! tfaas-jobs: single-flight provisioning job engine
//!
//! At most one job runs at a time. A submission is admitted only when no job
//! is `RUNNING`; it replaces the previous record, dispatches the executor on
//! a background task and returns the new job id immediately. Pollers read
//! whole-record snapshots by id.
//!
//! ```text
//!  (none) ── submit ──▶ RUNNING ──▶ SUCCESS
//!                          └──────▶ ERROR
//! ```

pub mod engine;
pub mod error;
pub mod executor;
pub mod job;
pub mod metrics;
pub mod router;
pub mod telemetry;

pub use engine::{Completion, CompletionWorker, JobEngine, JobEvent};
pub use error::JobError;
pub use executor::Executor;
pub use job::{Action, Job, JobId, JobOutcome, JobRequest, JobStatus};
pub use metrics::JobMetrics;
pub use router::{create_router, JobsState, StatusBody};
pub use telemetry::JobTelemetry;
