use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Job metrics collector
#[derive(Clone)]
pub struct JobMetrics {
    /// Admitted submissions
    jobs_submitted: IntCounter,

    /// Rejected submissions by reason
    jobs_rejected: IntCounterVec,

    /// Jobs that finished with SUCCESS
    jobs_succeeded: IntCounter,

    /// Jobs that finished with ERROR
    jobs_failed: IntCounter,

    /// 1 while a job is running
    job_running: IntGauge,

    /// Admission-to-completion time
    job_duration: Histogram,

    registry: Registry,
}

impl JobMetrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let jobs_submitted =
            IntCounter::new("tfaas_jobs_submitted_total", "Total number of admitted jobs")?;
        registry.register(Box::new(jobs_submitted.clone()))?;

        let jobs_rejected = IntCounterVec::new(
            Opts::new("tfaas_jobs_rejected_total", "Total number of rejected submissions"),
            &["reason"],
        )?;
        registry.register(Box::new(jobs_rejected.clone()))?;

        let jobs_succeeded = IntCounter::new(
            "tfaas_jobs_succeeded_total",
            "Total number of jobs that finished successfully",
        )?;
        registry.register(Box::new(jobs_succeeded.clone()))?;

        let jobs_failed =
            IntCounter::new("tfaas_jobs_failed_total", "Total number of jobs that failed")?;
        registry.register(Box::new(jobs_failed.clone()))?;

        let job_running = IntGauge::new("tfaas_job_running", "1 while a job is running")?;
        registry.register(Box::new(job_running.clone()))?;

        // Provisioning runs take seconds to tens of minutes
        let job_duration = Histogram::with_opts(
            HistogramOpts::new("tfaas_job_duration_seconds", "Job duration in seconds").buckets(
                vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 3600.0],
            ),
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(Self {
            jobs_submitted,
            jobs_rejected,
            jobs_succeeded,
            jobs_failed,
            job_running,
            job_duration,
            registry,
        })
    }

    pub fn job_admitted(&self) {
        self.jobs_submitted.inc();
        self.job_running.set(1);
    }

    pub fn job_rejected(&self, reason: &str) {
        self.jobs_rejected.with_label_values(&[reason]).inc();
    }

    pub fn job_finished(&self, success: bool, duration_ms: Option<u64>) {
        if success {
            self.jobs_succeeded.inc();
        } else {
            self.jobs_failed.inc();
        }
        if let Some(ms) = duration_ms {
            self.job_duration.observe(ms as f64 / 1000.0);
        }
        self.job_running.set(0);
    }

    /// Render all metrics in the prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = JobMetrics::new().unwrap();
        metrics.job_admitted();
        metrics.job_rejected("busy");
        metrics.job_finished(false, Some(2500));

        let text = metrics.render().unwrap();
        assert!(text.contains("tfaas_jobs_submitted_total 1"));
        assert!(text.contains("tfaas_jobs_rejected_total{reason=\"busy\"} 1"));
        assert!(text.contains("tfaas_jobs_failed_total 1"));
        assert!(text.contains("tfaas_job_running 0"));
    }
}
