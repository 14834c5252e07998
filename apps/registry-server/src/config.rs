//! Layered server configuration: defaults, then a YAML file, then
//! `REGISTRY__*` environment overrides.

use std::path::Path;

use accounts::config::AccountsConfig;
use accounts::infra::federation::FederationConfig;
use accounts::infra::objectstore::StorageConfig;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use registry_auth::StaticUser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub federation: FederationConfig,
    pub storage: StorageConfig,
    pub accounts: AccountsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds.
    pub listen: String,
    /// Hostname under which this registry is reachable by clients and
    /// peers; also stamped into issued sublease tokens.
    pub public_hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
            public_hostname: "localhost".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Token endpoint advertised in bearer challenges.
    #[must_use]
    pub fn auth_realm(&self) -> String {
        format!("https://{}/keppel/v1/auth", self.public_hostname)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite::memory:".to_owned(),
        }
    }
}

/// Auth driver selection, by plugin-type identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "kebab-case", deny_unknown_fields)]
pub enum AuthConfig {
    Static {
        #[serde(default)]
        users: Vec<StaticUser>,
    },
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::Static { users: Vec::new() }
    }
}

impl AppConfig {
    /// Load the layered configuration. A missing file path falls back to
    /// pure defaults plus environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed("REGISTRY__").split("__"))
            .extract()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
