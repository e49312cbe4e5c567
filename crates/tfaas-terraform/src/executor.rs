//! [`Executor`] backed by the terraform CLI

use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tfaas_core::TerraformSettings;
use tfaas_jobs::{Executor, JobRequest};
use tracing::{info, instrument};

use crate::driver::Driver;
use crate::fetcher::{Fetcher, GitCredentials};
use crate::installer::Installer;

pub struct TerraformExecutor {
    installer: Installer,
    fetcher: Fetcher,
    work_dir: PathBuf,
}

impl TerraformExecutor {
    pub fn new(installer: Installer, fetcher: Fetcher, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            installer,
            fetcher,
            work_dir: work_dir.into(),
        }
    }

    /// Wire everything from settings; git credentials come from the environment
    pub fn from_settings(settings: &TerraformSettings) -> Self {
        let installer = Installer::new(&settings.install_dir, &settings.release_url);
        let fetcher = Fetcher::new(settings.repository.clone(), settings.allow_local_paths)
            .with_credentials(GitCredentials::from_env());
        Self::new(installer, fetcher, &settings.work_dir)
    }
}

#[async_trait]
impl Executor for TerraformExecutor {
    #[instrument(skip(self, request), fields(action = %request.action, version = %request.version, path = %request.path))]
    async fn execute(&self, request: &JobRequest) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("creating work dir {}", self.work_dir.display()))?;

        // Removed on drop, whichever step returns first
        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.work_dir)
            .context("creating scratch directory")?;

        let executable = self
            .installer
            .install(&request.version)
            .await
            .with_context(|| format!("installing terraform {}", request.version))?;

        let config_dir = self
            .fetcher
            .fetch(&request.path, &scratch.path().join("repo"))
            .await
            .with_context(|| format!("fetching {}", request.path))?;

        Driver::new(executable)
            .run_action(request.action, &config_dir)
            .await
            .with_context(|| format!("terraform {}", request.action))?;

        info!("Job finished cleanly");
        Ok(())
    }
}
