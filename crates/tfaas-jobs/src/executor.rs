//! Executor seam
//!
//! The engine knows nothing about how provisioning happens. It hands a
//! validated [`JobRequest`] to an [`Executor`] exactly once per admitted job
//! and records whatever comes back.

use anyhow::Result;
use async_trait::async_trait;

use crate::job::{JobOutcome, JobRequest};

/// Performs one provisioning run
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run the requested action to completion.
    ///
    /// May take minutes. The engine imposes no timeout and never retries.
    async fn execute(&self, request: &JobRequest) -> Result<()>;
}

/// Map an executor result onto the job outcome, keeping the whole error chain
pub fn outcome_of(result: Result<()>) -> JobOutcome {
    match result {
        Ok(()) => JobOutcome::Succeeded,
        Err(e) => JobOutcome::failed(format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_outcome_keeps_context() {
        let err: Result<()> = Err(anyhow::anyhow!("exit status 1")).context("terraform apply");
        assert_eq!(
            outcome_of(err),
            JobOutcome::Failed("terraform apply: exit status 1".to_string())
        );
        assert_eq!(outcome_of(Ok(())), JobOutcome::Succeeded);
    }
}
