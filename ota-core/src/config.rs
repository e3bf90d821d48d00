/// Update server configuration, stored by the firmware and handed to the core
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Placeholder replaced by the published version in `firmware_template`.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Resource holding the latest published version string.
pub const LATEST_RESOURCE: &str = "latest";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OtaConfig {
    /// Server base URL. Empty disables update checking.
    pub base_url: String,
    /// Firmware file name, e.g. `dashboard_{version}.bin`.
    pub firmware_template: String,
    pub check_timeout_secs: u32,
    /// Governs the whole image download; there is no resumption.
    pub download_timeout_secs: u32,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            firmware_template: format!("firmware_{}.bin", VERSION_PLACEHOLDER),
            check_timeout_secs: 30,
            download_timeout_secs: 300,
        }
    }
}

impl OtaConfig {
    pub fn is_enabled(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn latest_url(&self) -> String {
        format!("{}/{}", self.base(), LATEST_RESOURCE)
    }

    pub fn firmware_file(&self, version: &str) -> String {
        self.firmware_template.replace(VERSION_PLACEHOLDER, version)
    }

    pub fn firmware_url(&self, version: &str) -> String {
        format!("{}/{}", self.base(), self.firmware_file(version))
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs as u64)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.firmware_template.contains(VERSION_PLACEHOLDER) {
            return Err(ConfigError::InvalidTemplate(self.firmware_template.clone()));
        }
        Ok(())
    }

    /// Turn update checks off, as if no server were configured.
    pub fn disable(&mut self) {
        self.base_url.clear();
    }
}
