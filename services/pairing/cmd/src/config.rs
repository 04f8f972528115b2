//! Configuration handling for the pairing service.
//!
//! Values come from the shared config file (`services.pairing.config`),
//! then `PAIRING_*` environment variables, then command-line flags.

use anyhow::{bail, Result};
use pairing_session::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
use pairing_wire::DEFAULT_MAX_VALUE_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Pairing service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Service name shown in log lines
    pub service_name: String,
    /// Cap on a reassembled public key or confirmation
    pub max_value_bytes: usize,
    /// Idle time before an unfinished session is evicted
    pub session_idle_timeout: Duration,
    /// Interval between eviction sweeps
    pub sweep_interval: Duration,
    /// Forward secure-service writes to the application channel
    pub forward_application_writes: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            service_name: "pairing".to_string(),
            max_value_bytes: DEFAULT_MAX_VALUE_SIZE,
            session_idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            forward_application_writes: false,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    pairing: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    config: Option<HashMap<String, String>>,
}

impl PairingConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", config_path.as_ref()),
        }

        config.apply_environment_overrides();
        config.validate()?;

        info!(
            "Final pairing configuration: max_value_bytes={}, idle_timeout={:?}, sweep_interval={:?}, forward_application_writes={}",
            config.max_value_bytes,
            config.session_idle_timeout,
            config.sweep_interval,
            config.forward_application_writes
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(values) = root_config
            .services
            .and_then(|s| s.pairing)
            .and_then(|p| p.config)
        else {
            return;
        };

        for (key, value) in values {
            match key.strip_prefix("services.pairing.") {
                Some(name) => self.apply_value(name, &value, "config file"),
                None => warn!("Ignoring config key outside services.pairing: {}", key),
            }
        }
    }

    /// Apply one named value; unparsable values are logged and skipped
    fn apply_value(&mut self, name: &str, value: &str, source: &str) {
        let applied = match name {
            "service_name" => {
                self.service_name = value.to_string();
                true
            }
            "max_value_bytes" => value.parse().map(|v| self.max_value_bytes = v).is_ok(),
            "session_idle_timeout" => humantime::parse_duration(value)
                .map(|v| self.session_idle_timeout = v)
                .is_ok(),
            "sweep_interval" => humantime::parse_duration(value)
                .map(|v| self.sweep_interval = v)
                .is_ok(),
            "forward_application_writes" => {
                self.forward_application_writes = value.eq_ignore_ascii_case("true");
                true
            }
            _ => {
                // Ignore unknown configuration keys
                return;
            }
        };

        if !applied {
            warn!("Invalid value {:?} for {} from {}", value, name, source);
        }
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        const OVERRIDES: [(&str, &str); 5] = [
            ("PAIRING_SERVICE_NAME", "service_name"),
            ("PAIRING_MAX_VALUE_BYTES", "max_value_bytes"),
            ("PAIRING_IDLE_TIMEOUT", "session_idle_timeout"),
            ("PAIRING_SWEEP_INTERVAL", "sweep_interval"),
            ("PAIRING_FORWARD_APPLICATION_WRITES", "forward_application_writes"),
        ];

        for (var, name) in OVERRIDES {
            if let Some(value) = lookup(var) {
                info!("{} overridden by environment: {}", name, value);
                self.apply_value(name, &value, "environment");
            }
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_value_bytes == 0 {
            bail!("max_value_bytes must be greater than zero");
        }
        if self.session_idle_timeout.is_zero() {
            bail!("session_idle_timeout must be greater than zero");
        }
        if self.sweep_interval.is_zero() {
            bail!("sweep_interval must be greater than zero");
        }
        Ok(())
    }
}
