//! CLI configuration.
//!
//! Values come from, in increasing precedence: defaults, an optional YAML
//! or TOML file, `ABCI_*` environment variables and command-line flags.
//! Nested keys use a double underscore, e.g.
//! `ABCI_KVSTORE__SNAPSHOT_INTERVAL=10`.

use crate::logging::LogFormat;
use abci_client::Address;
use abci_kvstore::KvStoreConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ABCI";

/// Configuration shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application address, `tcp://host:port` or `unix://path`.
    pub address: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Reference application settings.
    pub kvstore: KvStoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "tcp://127.0.0.1:26658".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            kvstore: KvStoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path` and the environment. The result
    /// is not validated until command-line overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|built| built.try_deserialize())
            .context("failed to load configuration")
    }

    /// Checks that the address parses and the kvstore settings are usable.
    pub fn validate(&self) -> Result<()> {
        self.parsed_address()?;
        self.kvstore.validate()?;
        Ok(())
    }

    /// The application address.
    pub fn parsed_address(&self) -> Result<Address> {
        self.address
            .parse()
            .with_context(|| format!("invalid address {:?}", self.address))
    }
}
