//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::credentials::Credentials;
use crate::task::{Device, SessionSettings};

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// SSH connection configuration for one device.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Username for password authentication.
    pub username: String,

    pub password: SecretString,

    /// Bound on connect, handshake and authentication.
    pub timeout: Duration,

    /// Ceiling on a single drain.
    pub drain_timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file; `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    pub fn new(device: &Device, credentials: &Credentials, settings: &SessionSettings) -> Self {
        Self {
            host: device.host.clone(),
            port: device.port,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            timeout: settings.connect_timeout,
            drain_timeout: settings.drain_timeout,
            terminal_width: settings.terminal_width,
            terminal_height: settings.terminal_height,
            host_key_verification: settings.host_key_verification,
            known_hosts_path: None,
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_task_parts() {
        let device = Device::new("edge-1", 2222);
        let creds = Credentials::new("ops", "pw");
        let settings = SessionSettings::default();

        let config = SshConfig::new(&device, &creds, &settings);
        assert_eq!(config.socket_addr(), "edge-1:2222");
        assert_eq!(config.username, "ops");
        assert_eq!(config.timeout, settings.connect_timeout);
        assert_eq!(config.host_key_verification, HostKeyVerification::AcceptNew);
    }

    #[test]
    fn test_host_key_mode_names() {
        let mode: HostKeyVerification = serde_json::from_str(r#""disabled""#).unwrap();
        assert_eq!(mode, HostKeyVerification::Disabled);
        let mode: HostKeyVerification = serde_json::from_str(r#""acceptNew""#).unwrap();
        assert_eq!(mode, HostKeyVerification::AcceptNew);
    }
}
