//! Terraform CLI driver

use std::path::{Path, PathBuf};
use tfaas_jobs::Action;
use tracing::{info, warn};

use crate::command::{self, CommandOutput};
use crate::error::Result;

const AUTOMATION_ENV: [(&str, &str); 1] = [("TF_IN_AUTOMATION", "1")];

/// Runs terraform subcommands against a configuration directory
#[derive(Debug, Clone)]
pub struct Driver {
    executable: PathBuf,
}

impl Driver {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub async fn init(&self, dir: &Path) -> Result<()> {
        self.terraform(dir, &["init", "-upgrade", "-input=false", "-no-color"])
            .await
    }

    pub async fn apply(&self, dir: &Path) -> Result<()> {
        self.terraform(dir, &["apply", "-auto-approve", "-input=false", "-no-color"])
            .await
    }

    pub async fn destroy(&self, dir: &Path) -> Result<()> {
        self.terraform(dir, &["destroy", "-auto-approve", "-input=false", "-no-color"])
            .await
    }

    /// `init` followed by the requested action
    pub async fn run_action(&self, action: Action, dir: &Path) -> Result<()> {
        self.init(dir).await?;
        match action {
            Action::Apply => self.apply(dir).await?,
            Action::Destroy => self.destroy(dir).await?,
        }
        info!(action = %action, dir = %dir.display(), "Terraform action completed");
        Ok(())
    }

    async fn terraform(&self, dir: &Path, args: &[&str]) -> Result<()> {
        let output = command::run(&self.executable, args, Some(dir), &AUTOMATION_ENV, &[]).await?;
        let subcommand = args.first().copied().unwrap_or_default();

        if let Some(line) = summary(&output) {
            info!(subcommand = %subcommand, summary = %line, "Terraform output");
        }
        if !output.stderr.trim().is_empty() {
            warn!(subcommand = %subcommand, stderr = %output.stderr.trim(), "Terraform wrote to stderr");
        }
        Ok(())
    }
}

/// Last non-blank stdout line, e.g. `Apply complete! Resources: 1 added, 0 changed, 0 destroyed.`
pub fn summary(output: &CommandOutput) -> Option<&str> {
    output
        .stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
}
