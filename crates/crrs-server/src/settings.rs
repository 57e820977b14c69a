//! Server configuration: `config.toml` overlaid with `CRRS_*` environment
//! variables.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use crrs_engine::EngineConfig;
use serde::Deserialize;

/// Runtime server configuration. Every field has a default, so a missing
/// config file is not an error.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Upper bound on each store read made while scoring.
  pub read_timeout_ms: u64,
  /// How long the active threshold config is reused between fetches.
  pub config_ttl_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            8080,
      store_path:      PathBuf::from("~/.local/share/crrs/crrs.db"),
      read_timeout_ms: 5_000,
      config_ttl_secs: 60,
    }
  }
}

impl ServerConfig {
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("CRRS")),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    builder
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      read_timeout: Duration::from_millis(self.read_timeout_ms),
      config_ttl:   Duration::from_secs(self.config_ttl_secs),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use config::{File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    ServerConfig::from_builder(
      config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
    )
    .unwrap()
  }

  #[test]
  fn empty_file_yields_defaults() {
    assert_eq!(parse(""), ServerConfig::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let cfg = parse(
      r#"
        host = "0.0.0.0"
        port = 9000
        store_path = "/var/lib/crrs/scores.db"
        read_timeout_ms = 750
        config_ttl_secs = 5
      "#,
    );
    assert_eq!(cfg.address(), "0.0.0.0:9000");
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/crrs/scores.db"));
    assert_eq!(cfg.engine_config().read_timeout, Duration::from_millis(750));
    assert_eq!(cfg.engine_config().config_ttl, Duration::from_secs(5));
  }

  #[test]
  fn partial_file_keeps_remaining_defaults() {
    let cfg = parse("port = 7070");
    assert_eq!(cfg.port, 7070);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.read_timeout_ms, 5_000);
  }
}
