use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerraformError {
    #[error("invalid terraform version '{0}'")]
    InvalidVersion(String),

    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("release archive is invalid")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid configuration path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid repository '{0}'")]
    InvalidRepository(String),

    #[error("configuration directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("{command} exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl TerraformError {
    pub fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        TerraformError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerraformError>;
