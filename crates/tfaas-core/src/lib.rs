//! tfaas-core: shared plumbing for the tfaas workspace
//!
//! - Environment file loading (`config`)
//! - Layered service settings (`settings`)
//! - Common error type (`error`)

pub mod config;
pub mod error;
pub mod settings;

pub use error::{Error, Result};
pub use settings::{ServerSettings, Settings, TerraformSettings};
