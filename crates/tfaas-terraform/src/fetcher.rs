//! Configuration checkout
//!
//! A job path is either relative to the configured repository, which is
//! cloned fresh for every job, or (when allowed) an absolute local
//! directory used in place. Git credentials come from `GIT_USERNAME` /
//! `GIT_PASSWORD` in the process environment, never from the request.

use std::path::{Component, Path, PathBuf};
use tfaas_core::config::get_env_opt;
use tracing::info;

use crate::command;
use crate::error::{Result, TerraformError};

#[derive(Clone)]
pub struct GitCredentials {
    pub username: String,
    pub password: String,
}

impl GitCredentials {
    /// Read `GIT_USERNAME` / `GIT_PASSWORD`; both must be set
    pub fn from_env() -> Option<Self> {
        Some(Self {
            username: get_env_opt("GIT_USERNAME")?,
            password: get_env_opt("GIT_PASSWORD")?,
        })
    }
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    repository: Option<String>,
    credentials: Option<GitCredentials>,
    allow_local_paths: bool,
    git: PathBuf,
}

impl Fetcher {
    pub fn new(repository: Option<String>, allow_local_paths: bool) -> Self {
        Self {
            repository,
            credentials: None,
            allow_local_paths,
            git: PathBuf::from("git"),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<GitCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Materialise the configuration for `path` and return its directory.
    ///
    /// `dest` must not exist yet; it receives the clone.
    pub async fn fetch(&self, path: &str, dest: &Path) -> Result<PathBuf> {
        let requested = Path::new(path);

        if requested.is_absolute() {
            if !self.allow_local_paths {
                return Err(TerraformError::invalid_path(path, "absolute paths are not allowed"));
            }
            if !requested.is_dir() {
                return Err(TerraformError::MissingDirectory(requested.to_path_buf()));
            }
            info!(path = %path, "Using local configuration directory");
            return Ok(requested.to_path_buf());
        }

        let relative = checked_relative(path)?;
        let repository = self
            .repository
            .as_deref()
            .ok_or_else(|| TerraformError::invalid_path(path, "no repository configured"))?;

        let url = self.clone_url(repository)?;
        let dest_arg = dest.to_string_lossy();
        let secrets = self.secrets(&url);
        let secrets: Vec<&str> = secrets.iter().map(String::as_str).collect();

        command::run(
            &self.git,
            &["clone", "--depth", "1", "--quiet", &url, &dest_arg],
            None,
            &[("GIT_TERMINAL_PROMPT", "0")],
            &secrets,
        )
        .await?;

        let config_dir = dest.join(relative);
        if !config_dir.is_dir() {
            return Err(TerraformError::MissingDirectory(config_dir));
        }

        info!(path = %path, dir = %config_dir.display(), "Configuration checked out");
        Ok(config_dir)
    }

    /// Clone URL with credentials embedded for HTTP(S) remotes.
    ///
    /// `github.com/acme/infra.git` is taken to mean HTTPS; local paths and
    /// other schemes are passed through untouched.
    pub fn clone_url(&self, repository: &str) -> Result<String> {
        if repository.starts_with('/') || repository.starts_with('.') {
            return Ok(repository.to_string());
        }

        let with_scheme = if repository.contains("://") {
            repository.to_string()
        } else {
            format!("https://{}", repository)
        };

        let mut url = reqwest::Url::parse(&with_scheme)
            .map_err(|_| TerraformError::InvalidRepository(repository.to_string()))?;

        let is_http = matches!(url.scheme(), "http" | "https");
        if let (Some(creds), true) = (&self.credentials, is_http) {
            let invalid = |_| TerraformError::InvalidRepository(repository.to_string());
            url.set_username(&creds.username).map_err(invalid)?;
            url.set_password(Some(&creds.password)).map_err(invalid)?;
        }

        Ok(url.to_string())
    }

    /// Password forms to scrub from output: as configured, and as it
    /// appears percent-encoded inside `url`
    fn secrets(&self, url: &str) -> Vec<String> {
        let Some(creds) = &self.credentials else {
            return Vec::new();
        };

        let mut secrets = vec![creds.password.clone()];
        if let Some(encoded) = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.password().map(str::to_string))
        {
            if encoded != creds.password {
                secrets.push(encoded);
            }
        }
        secrets
    }
}

/// Accept only plain relative paths that stay inside the checkout
fn checked_relative(path: &str) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(TerraformError::invalid_path(path, "'..' is not allowed"))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TerraformError::invalid_path(path, "must be relative"))
            }
        }
    }
    Ok(clean)
}
