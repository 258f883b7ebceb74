//! Settings file schema

use std::time::Duration;

use serde::Deserialize;

use crate::remote::DialOptions;

/// Current settings file version
pub const SETTINGS_VERSION: u32 = 1;

/// Tunables read from `settings.json`
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    /// Bound on TCP connect plus login for FTP
    pub ftp_dial_timeout_secs: u64,
    /// Bound on the SSH handshake
    pub ssh_timeout_secs: u64,
    pub ssh_keepalive_secs: u64,
    /// How often the key reader polls the terminal
    pub poll_interval_ms: u64,
    /// Suffix the download manager appends to in-progress files
    pub partial_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            ftp_dial_timeout_secs: 5,
            ssh_timeout_secs: 10,
            ssh_keepalive_secs: 30,
            poll_interval_ms: 50,
            partial_suffix: ".part".to_string(),
        }
    }
}

impl Settings {
    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            ftp_dial_timeout: Duration::from_secs(self.ftp_dial_timeout_secs),
            ssh_timeout: Duration::from_secs(self.ssh_timeout_secs),
            ssh_keepalive: Duration::from_secs(self.ssh_keepalive_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
