//! Daemon configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sonority_core::VendorCatalogBridge;

/// Music service account used to resolve catalog items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    pub service_id: u32,
    pub flags: u32,
    pub serial_number: u32,
}

/// Daemon configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds discovery runs before topology is refreshed.
    /// Override: `SONORITY_DISCOVERY_WINDOW_SECS`
    pub discovery_window_secs: u64,

    /// Seconds between discovery rounds. 0 runs discovery once.
    /// Override: `SONORITY_REDISCOVER_INTERVAL_SECS`
    pub rediscover_interval_secs: u64,

    /// Milliseconds between transport refreshes.
    /// Override: `SONORITY_POLL_INTERVAL_MS`
    pub transport_poll_interval_ms: u64,

    /// UPnP device type searched for.
    pub search_device_type: String,

    /// Callback URL speakers send GENA NOTIFY requests to. Eventing is off when unset.
    /// The daemon keeps subscriptions alive but does not receive NOTIFY
    /// itself; point this at an external receiver.
    /// Override: `SONORITY_EVENT_CALLBACK_URL`
    pub event_callback_url: Option<String>,

    /// Revert optimistic updates when a command fails.
    pub rollback_on_failure: bool,

    /// Catalog bridge account.
    pub catalog: Option<CatalogConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let core = sonority_core::Config::default();
        Self {
            discovery_window_secs: core.discovery_window_secs,
            rediscover_interval_secs: 0,
            transport_poll_interval_ms: core.transport_poll_interval_ms,
            search_device_type: core.search_device_type,
            event_callback_url: None,
            rollback_on_failure: core.rollback_on_failure,
            catalog: None,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SONORITY_DISCOVERY_WINDOW_SECS") {
            if let Ok(secs) = val.parse() {
                self.discovery_window_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SONORITY_REDISCOVER_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.rediscover_interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SONORITY_POLL_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.transport_poll_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("SONORITY_EVENT_CALLBACK_URL") {
            if !val.is_empty() {
                self.event_callback_url = Some(val);
            }
        }

        // Note: SONORITY_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to sonority-core's Config type.
    pub fn to_core_config(&self) -> sonority_core::Config {
        sonority_core::Config {
            discovery_window_secs: self.discovery_window_secs,
            transport_poll_interval_ms: self.transport_poll_interval_ms,
            search_device_type: self.search_device_type.clone(),
            event_callback_url: self.event_callback_url.clone(),
            rollback_on_failure: self.rollback_on_failure,
            ..Default::default()
        }
    }

    pub fn catalog_bridge(&self) -> Option<VendorCatalogBridge> {
        self.catalog
            .map(|c| VendorCatalogBridge::new(c.service_id, c.flags, c.serial_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        let core = config.to_core_config();
        assert_eq!(core.discovery_window_secs, 5);
        assert!(core.validate().is_ok());
        assert!(config.catalog_bridge().is_none());
    }

    #[test]
    fn yaml_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "transport_poll_interval_ms: 5000\nrollback_on_failure: true\ncatalog:\n  service_id: 204\n  flags: 8232\n  serial_number: 3"
        )
        .unwrap();

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        let core = config.to_core_config();
        assert_eq!(core.transport_poll_interval_ms, 5000);
        assert!(core.rollback_on_failure);
        assert_eq!(core.ssdp_mx, 3);
        assert_eq!(config.catalog_bridge().map(|b| b.service_id), Some(204));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "discovery_window_secs: [not, a, number]").unwrap();
        assert!(DaemonConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rediscover_interval_secs: 30").unwrap();

        std::env::set_var("SONORITY_REDISCOVER_INTERVAL_SECS", "120");
        let config = DaemonConfig::load(Some(file.path())).unwrap();
        std::env::remove_var("SONORITY_REDISCOVER_INTERVAL_SECS");

        assert_eq!(config.rediscover_interval_secs, 120);
    }

    #[test]
    fn callback_url_reaches_core_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event_callback_url: http://10.0.0.2:3400/notify").unwrap();

        let core = DaemonConfig::load(Some(file.path())).unwrap().to_core_config();
        assert_eq!(
            core.event_callback_url.as_deref(),
            Some("http://10.0.0.2:3400/notify")
        );
    }
}
