//! Versioned terraform installs
//!
//! Binaries are cached as `<install_dir>/<version>/terraform`. A cached
//! binary is reused as-is; otherwise the release archive is downloaded and
//! the binary extracted next to where it will live, then renamed into place.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use zip::ZipArchive;

use crate::error::{Result, TerraformError};

#[cfg(windows)]
pub const BINARY_NAME: &str = "terraform.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "terraform";

pub struct Installer {
    install_dir: PathBuf,
    release_url: String,
    client: reqwest::Client,
    // Serialises installs so two jobs never write the same binary
    lock: Mutex<()>,
}

impl Installer {
    pub fn new(install_dir: impl Into<PathBuf>, release_url: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            release_url: release_url.into(),
            client: reqwest::Client::new(),
            lock: Mutex::new(()),
        }
    }

    /// Return the path of the requested version, downloading it if needed.
    pub async fn install(&self, version: &str) -> Result<PathBuf> {
        validate_version(version)?;

        let _guard = self.lock.lock().await;

        let executable = self.executable_path(version);
        if executable.is_file() {
            info!(version = %version, path = %executable.display(), "Terraform already installed");
            return Ok(executable);
        }

        let version_dir = self.install_dir.join(version);
        tokio::fs::create_dir_all(&version_dir).await?;

        let url = self.archive_url(version);
        info!(version = %version, url = %url, "Downloading terraform");
        let archive = self.download(&url).await?;

        let target = executable.clone();
        tokio::task::spawn_blocking(move || extract_binary(&archive, &target))
            .await
            .map_err(|e| TerraformError::Task(e.to_string()))??;

        info!(version = %version, path = %executable.display(), "Terraform installed");
        Ok(executable)
    }

    pub fn executable_path(&self, version: &str) -> PathBuf {
        self.install_dir.join(version).join(BINARY_NAME)
    }

    /// Release archive URL for this platform
    pub fn archive_url(&self, version: &str) -> String {
        let (os, arch) = platform();
        format!(
            "{base}/{v}/terraform_{v}_{os}_{arch}.zip",
            base = self.release_url.trim_end_matches('/'),
            v = version,
            os = os,
            arch = arch,
        )
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let to_error = |source| TerraformError::Download {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(to_error)?;
        let bytes = response.bytes().await.map_err(to_error)?;
        Ok(bytes.to_vec())
    }
}

/// Versions become directory names and URL segments
fn validate_version(version: &str) -> Result<()> {
    let valid = !version.is_empty()
        && version.chars().next().is_some_and(|c| c.is_ascii_digit())
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    if valid {
        Ok(())
    } else {
        Err(TerraformError::InvalidVersion(version.to_string()))
    }
}

/// HashiCorp release naming for the running platform
fn platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    (os, arch)
}

fn extract_binary(archive: &[u8], target: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(BINARY_NAME)?;

    let partial = target.with_extension("partial");
    {
        let mut out = std::fs::File::create(&partial)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755))?;
    }

    std::fs::rename(&partial, target)?;
    Ok(())
}
