//! Environment File Loader
//!
//! Loads `KEY=VALUE` pairs into the process environment before settings are
//! built. Git credentials (`GIT_USERNAME`, `GIT_PASSWORD`) usually live here.
//!
//! Lookup order:
//! 1. `$TFAAS_ENV_FILE`
//! 2. `/etc/tfaas/environment`
//! 3. `.env` in the working directory
//!
//! Variables that are already set are never overridden.

use std::path::Path;
use tracing::{debug, info, warn};

/// Variable naming a custom environment file
pub const ENV_FILE_VAR: &str = "TFAAS_ENV_FILE";

/// Paths checked when `TFAAS_ENV_FILE` is unset or unreadable
pub const ENV_FILE_PATHS: &[&str] = &["/etc/tfaas/environment", ".env"];

/// Load the first environment file found.
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var(ENV_FILE_VAR) {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded) = try_load_env_file(path) {
            return Some(loaded);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    if !Path::new(path).exists() {
        return None;
    }

    // dotenvy::from_path leaves already-set variables alone
    match dotenvy::from_path(path) {
        Ok(()) => {
            info!(path = %path, "Loaded environment file");
            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Get an optional environment value, treating empty strings as unset.
pub fn get_env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
