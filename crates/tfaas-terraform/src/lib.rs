//! tfaas-terraform: runs jobs with the terraform CLI
//!
//! Each job installs the requested terraform version (cached per version),
//! checks out its configuration into a scratch directory, then runs
//! `init` followed by `apply` or `destroy`.

pub mod command;
pub mod driver;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod installer;

pub use driver::Driver;
pub use error::{Result, TerraformError};
pub use executor::TerraformExecutor;
pub use fetcher::{Fetcher, GitCredentials};
pub use installer::{Installer, BINARY_NAME};
