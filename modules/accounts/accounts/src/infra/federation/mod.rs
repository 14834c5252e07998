//! Federation driver plugins.
//!
//! The driver is selected by a plugin-type identifier in the server
//! configuration. `noop` is for single-site deployments that never
//! contend for names, `in-memory` backs tests, and `rest` speaks to an
//! external federation authority.

pub mod in_memory;
pub mod noop;
pub mod rest;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::drivers::FederationDriver;

pub use in_memory::InMemoryFederationDriver;
pub use noop::NoopFederationDriver;
pub use rest::RestFederationDriver;

/// Driver selection, as it appears in the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "kebab-case", deny_unknown_fields)]
pub enum FederationConfig {
    Noop,
    InMemory,
    Rest {
        url: Url,
        #[serde(default)]
        token: Option<String>,
    },
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig::Noop
    }
}

#[must_use]
pub fn driver_from_config(config: &FederationConfig) -> Arc<dyn FederationDriver> {
    match config {
        FederationConfig::Noop => Arc::new(NoopFederationDriver),
        FederationConfig::InMemory => Arc::new(InMemoryFederationDriver::default()),
        FederationConfig::Rest { url, token } => {
            Arc::new(RestFederationDriver::new(url.clone(), token.clone()))
        }
    }
}
