//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LogSettings};

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// level.
pub fn init(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => configured_filter(settings)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Only the configured directives; anything they do not name stays off.
fn configured_filter(settings: &LogSettings) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_new(&settings.level)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_names_only_warden_crates() {
        let filter = configured_filter(&LogSettings::default()).unwrap();
        assert_eq!(filter.to_string(), "warden=info");
    }

    #[test]
    fn malformed_level_is_rejected() {
        let settings = LogSettings {
            level: "warden=[[".into(),
            ..Default::default()
        };
        assert!(configured_filter(&settings).is_err());
    }
}
