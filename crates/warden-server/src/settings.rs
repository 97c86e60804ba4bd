//! Layered settings: built-in defaults, an optional TOML file, then
//! `WARDEN__`-prefixed environment variables
//! (e.g. `WARDEN__AUTH__SECRET_KEY`, `WARDEN__DATABASE__URL`).

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use warden_auth::AuthConfig;
use warden_db::DbConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warden=info".into(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub log: LogSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("WARDEN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::authz::TrustModel;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(settings.auth.access_token_lifetime_secs, 900);
        assert_eq!(settings.auth.trust_model, TrustModel::LiveLookup);
        assert_eq!(settings.database.namespace, "warden");
        assert_eq!(settings.log.format, LogFormat::Json);
    }
}
