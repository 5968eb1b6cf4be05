//! Configuration (spec §12)
//!
//! [`Config`] is loaded the way the teacher loads its own config: a plain
//! struct deserialized with `serde`, every optional field defaulted so a
//! minimal document (just `controller_url` and `sdk_info`) is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::controller::client::RedirectObserver;
use crate::controller::types::SdkInfo;

/// Top-level configuration for an [`crate::EdgeClient`].
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base URL of the controller (e.g. `https://ctrl.example:1280`).
    pub controller_url: Url,
    /// TLS trust configuration.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Page size used for every paged list operation (spec §4.C "Pagination algorithm").
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Interval between posture-engine ticks, seconds (spec §4.E).
    #[serde(default = "default_posture_interval_secs")]
    pub posture_interval_secs: u64,
    /// TCP connect timeout, seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// SDK/host identification sent with every login (spec §6).
    pub sdk_info: SdkInfo,
    /// Invoked when the controller base URL changes due to a rebind (spec
    /// §4.C). Not deserializable; set programmatically after loading.
    #[serde(skip)]
    pub redirect_observer: Option<RedirectObserver>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("controller_url", &self.controller_url)
            .field("tls", &self.tls)
            .field("page_size", &self.page_size)
            .field("posture_interval_secs", &self.posture_interval_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("sdk_info", &self.sdk_info)
            .field("redirect_observer", &self.redirect_observer.is_some())
            .finish()
    }
}

/// TLS trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to a PEM-encoded CA bundle to trust in addition to the platform
    /// store. `None` trusts only the platform store.
    #[serde(default)]
    pub ca_bundle_path: Option<PathBuf>,
}

fn default_page_size() -> usize {
    25
}

fn default_posture_interval_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    15
}

impl Config {
    /// Parse a YAML configuration document (spec §12).
    pub fn from_yaml(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }

    /// Load and parse a YAML configuration file from disk.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ControllerError::new(
                crate::error::ErrorKind::InvalidConfig,
                format!("failed to read config {}: {e}", path.display()),
            )
        })?;
        Self::from_yaml(&raw).map_err(|e| {
            crate::error::ControllerError::new(
                crate::error::ErrorKind::InvalidConfig,
                format!("failed to parse config {}: {e}", path.display()),
            )
        })
    }
}
