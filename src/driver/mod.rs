//! Storage driver backends
//!
//! One reference backend today: the single-host driver against the local
//! SCST control tree. Future backends (clustered target frameworks)
//! implement the same [`IscsiDriver`] contract without touching callers.

pub mod single_host;

pub use single_host::*;

use crate::domain::ports::{CommandRunnerRef, IscsiDriver};
use crate::error::Result;
use std::sync::Arc;

/// Factory for creating driver backends
pub struct DriverFactory;

impl DriverFactory {
    /// Create a driver backend by name
    pub fn create(name: &str, runner: CommandRunnerRef) -> Result<Arc<dyn IscsiDriver>> {
        match name.to_lowercase().as_str() {
            "single-host" | "local" => Ok(Arc::new(SingleHostDriver::new(runner))),
            _ => Err(crate::error::Error::Configuration(format!(
                "unknown driver backend: {}",
                name
            ))),
        }
    }
}
