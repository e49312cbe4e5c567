//! Layered service settings
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. `TFAAS_*` environment variables, `__` between sections
//!    (e.g. `TFAAS_SERVER__BIND=127.0.0.1:9000`)

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::get_env_opt;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub terraform: TerraformSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind address (host:port)
    pub bind: String,
    /// Allowed CORS origins; empty means any
    #[serde(default)]
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerraformSettings {
    /// Where versioned terraform binaries are cached
    pub install_dir: PathBuf,
    /// Base URL of the release archive server
    pub release_url: String,
    /// Repository holding the configurations, without scheme or credentials
    /// (e.g. `github.com/acme/infra.git`). Unset means job paths are local.
    pub repository: Option<String>,
    /// Parent directory for per-job scratch checkouts
    pub work_dir: PathBuf,
    /// Accept absolute job paths pointing at the local filesystem
    pub allow_local_paths: bool,
}

impl Settings {
    /// Build settings from defaults, an optional file, and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.bind", "0.0.0.0:8080")?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("server.request_timeout_secs", 30)?
            .set_default(
                "terraform.install_dir",
                std::env::temp_dir().join("tfaas").join("bin").display().to_string(),
            )?
            .set_default("terraform.release_url", "https://releases.hashicorp.com/terraform")?
            .set_default(
                "terraform.work_dir",
                std::env::temp_dir().join("tfaas").join("work").display().to_string(),
            )?
            .set_default("terraform.allow_local_paths", false)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("TFAAS")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.finish()
    }

    fn finish(mut self) -> Result<Self> {
        // Older deployments name the repository with a bare GIT_REPOSITORY
        if self.terraform.repository.is_none() {
            self.terraform.repository = get_env_opt("GIT_REPOSITORY");
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::invalid_argument(
                "server.request_timeout_secs must be greater than zero",
            ));
        }
        if self.terraform.release_url.is_empty() {
            return Err(Error::invalid_argument("terraform.release_url must not be empty"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(!settings.server.bind.is_empty());
        assert!(settings.server.request_timeout_secs > 0);
        assert!(settings.terraform.release_url.starts_with("https://"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "127.0.0.1:9999"
cors_origins = ["https://ops.example.com"]

[terraform]
repository = "github.com/acme/infra.git"
allow_local_paths = true
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:9999");
        assert_eq!(settings.server.cors_origins, vec!["https://ops.example.com"]);
        assert_eq!(
            settings.terraform.repository.as_deref(),
            Some("github.com/acme/infra.git")
        );
        assert!(settings.terraform.allow_local_paths);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nrequest_timeout_secs = 0").unwrap();

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/tfaas.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
