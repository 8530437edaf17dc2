//! Task definition: what to run, where, and where the results go.
//!
//! A [`Task`] is built once, either directly or from a JSON task file via
//! [`TaskFile`], and is read-only for the whole batch run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Result, TaskError};
use crate::strategy::DeviceType;
use crate::transport::HostKeyVerification;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Where transcripts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Delimited blocks on the standard output stream.
    Stdout,
    /// One file per device inside the directory.
    PerDevice(PathBuf),
    /// One combined file for the whole run inside the directory.
    SingleFile(PathBuf),
}

/// A target device. Identity is the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub host: String,
    pub port: u16,
}

impl Device {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[v6addr]:port`.
    pub fn parse(address: &str, default_port: u16) -> std::result::Result<Self, TaskError> {
        let address = address.trim();
        let invalid = || TaskError::InvalidAddress {
            address: address.to_string(),
        };

        if address.is_empty() {
            return Err(invalid());
        }

        if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| invalid())?,
                None if tail.is_empty() => default_port,
                None => return Err(invalid()),
            };
            return Ok(Self::new(host, port));
        }

        // A bare IPv6 address has several colons and no port.
        match address.split_once(':') {
            Some((host, port)) if !port.contains(':') => {
                let port = port.parse().map_err(|_| invalid())?;
                if host.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::new(host, port))
            }
            _ => Ok(Self::new(address, default_port)),
        }
    }

    /// Name used for per-device files: the host, plus `_<port>` when the
    /// port is not the default.
    pub fn identity(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}_{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_PORT {
            write!(f, "{}", self.host)
        } else if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Timeouts and SSH knobs applied to every device of a task.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Bound on TCP connect + SSH handshake + authentication.
    pub connect_timeout: Duration,

    /// Silence after which a device is considered done with the last input.
    pub quiet_period: Duration,

    /// Ceiling on a single drain, for devices that never go quiet.
    pub drain_timeout: Duration,

    /// Bound on waiting for a privileged prompt during escalation.
    pub escalation_timeout: Duration,

    pub terminal_width: u32,
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            quiet_period: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(30),
            escalation_timeout: Duration::from_secs(10),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
        }
    }
}

/// One automated run: devices, credentials, commands and output policy.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub device_type: DeviceType,
    pub credentials: Credentials,
    pub commands: Vec<String>,
    pub devices: Vec<Device>,
    pub output: OutputMode,
    /// `None` sends the run log to stdout.
    pub log_dir: Option<PathBuf>,
    pub settings: SessionSettings,
}

impl Task {
    /// Whether superuser escalation is requested.
    pub fn superuser(&self) -> bool {
        self.credentials.superuser_password.is_some()
    }

    /// Check the task can run: name, devices, commands and writable
    /// output/log directories (created if missing).
    ///
    /// An unrecognised device type is not an error here; it has already
    /// degraded to [`DeviceType::Default`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("missing name"));
        }
        if self.devices.is_empty() {
            return Err(invalid("no target devices found"));
        }
        if self.commands.is_empty() {
            return Err(invalid("no commands found"));
        }

        match &self.output {
            OutputMode::PerDevice(dir) | OutputMode::SingleFile(dir) => {
                check_writable_dir(dir, "output")?;
            }
            OutputMode::Stdout => {}
        }
        if let Some(dir) = &self.log_dir {
            check_writable_dir(dir, "log")?;
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> crate::Error {
    TaskError::Invalid {
        message: message.into(),
    }
    .into()
}

fn check_writable_dir(dir: &Path, what: &str) -> Result<()> {
    let scratch = dir.join(".netbatch-write-check");
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&scratch, b""))
        .and_then(|()| fs::remove_file(&scratch))
        .map_err(|e| invalid(format!("{} directory '{}': {}", what, dir.display(), e)))
}

/// On-disk JSON task definition.
///
/// Passwords are stored encrypted; [`TaskFile::into_task`] hands them to a
/// [`CredentialProvider`] to obtain plaintext credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFile {
    pub name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub superuser_password: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: String,
    pub devices: Vec<String>,
    pub commands: Vec<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub single_file: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub session: SessionFile,
}

/// Optional `session` object of a task file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionFile {
    pub port: Option<u16>,
    pub connect_timeout_secs: Option<u64>,
    pub quiet_period_millis: Option<u64>,
    pub drain_timeout_secs: Option<u64>,
    pub escalation_timeout_secs: Option<u64>,
    pub host_key_verification: Option<HostKeyVerification>,
}

impl SessionFile {
    fn into_settings(self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            connect_timeout: self
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            quiet_period: self
                .quiet_period_millis
                .map_or(defaults.quiet_period, Duration::from_millis),
            drain_timeout: self
                .drain_timeout_secs
                .map_or(defaults.drain_timeout, Duration::from_secs),
            escalation_timeout: self
                .escalation_timeout_secs
                .map_or(defaults.escalation_timeout, Duration::from_secs),
            host_key_verification: self
                .host_key_verification
                .unwrap_or(defaults.host_key_verification),
            ..defaults
        }
    }
}

impl TaskFile {
    /// Read and parse a JSON task file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TaskError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| {
            TaskError::Parse {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build the in-memory task, resolving credentials through `provider`.
    pub fn into_task(self, provider: &dyn CredentialProvider) -> Result<Task> {
        let credentials = provider.credentials(
            &self.login,
            &self.password,
            self.superuser_password.as_deref(),
        )?;

        let port = self.session.port.unwrap_or(DEFAULT_PORT);
        let devices = self
            .devices
            .iter()
            .map(|address| Device::parse(address, port))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let output = match self.output_dir {
            None => OutputMode::Stdout,
            Some(dir) if self.single_file => OutputMode::SingleFile(dir),
            Some(dir) => OutputMode::PerDevice(dir),
        };

        Ok(Task {
            name: self.name,
            description: self.description,
            device_type: DeviceType::from_tag(&self.device_type),
            credentials,
            commands: self.commands,
            devices,
            output,
            log_dir: self.log_dir,
            settings: self.session.into_settings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{XorHexCredentials, xor_encrypt};
    use secrecy::ExposeSecret;

    fn task_json(extra: &str) -> String {
        format!(
            r#"{{
                "name": "weekly_backup",
                "desc": "show running config",
                "login": "admin",
                "password": "{}",
                "type": "ciscoios",
                "devices": ["10.0.0.1", "core-sw:2222"],
                "commands": ["show run", "show version"]
                {}
            }}"#,
            xor_encrypt("secret", "admin"),
            extra
        )
    }

    #[test]
    fn test_parse_device_addresses() {
        assert_eq!(
            Device::parse("10.0.0.1", 22).unwrap(),
            Device::new("10.0.0.1", 22)
        );
        assert_eq!(
            Device::parse("router:2222", 22).unwrap(),
            Device::new("router", 2222)
        );
        assert_eq!(
            Device::parse("[fe80::1]:830", 22).unwrap(),
            Device::new("fe80::1", 830)
        );
        assert_eq!(
            Device::parse("fe80::1", 22).unwrap(),
            Device::new("fe80::1", 22)
        );
        assert!(Device::parse("router:ssh", 22).is_err());
        assert!(Device::parse("  ", 22).is_err());
    }

    #[test]
    fn test_device_identity() {
        assert_eq!(Device::new("10.0.0.1", 22).identity(), "10.0.0.1");
        assert_eq!(Device::new("router", 2222).identity(), "router_2222");
        assert_eq!(Device::new("router", 2222).to_string(), "router:2222");
    }

    #[test]
    fn test_load_task_file() {
        let file = TaskFile::from_json(&task_json("")).unwrap();
        let task = file.into_task(&XorHexCredentials).unwrap();

        assert_eq!(task.name, "weekly_backup");
        assert_eq!(task.description, "show running config");
        assert_eq!(task.device_type, DeviceType::CiscoIos);
        assert_eq!(task.credentials.username, "admin");
        assert_eq!(task.credentials.password.expose_secret(), "secret");
        assert!(!task.superuser());
        assert_eq!(
            task.devices,
            vec![Device::new("10.0.0.1", 22), Device::new("core-sw", 2222)]
        );
        assert_eq!(task.commands, vec!["show run", "show version"]);
        assert_eq!(task.output, OutputMode::Stdout);
        assert!(task.log_dir.is_none());
    }

    #[test]
    fn test_output_mode_and_superuser() {
        let extra = format!(
            r#", "superuserPassword": "{}", "outputDir": "/tmp/out", "singleFile": true,
                 "session": {{ "port": 830, "quietPeriodMillis": 250 }}"#,
            xor_encrypt("enablepw", "admin")
        );
        let task = TaskFile::from_json(&task_json(&extra))
            .unwrap()
            .into_task(&XorHexCredentials)
            .unwrap();

        assert!(task.superuser());
        assert_eq!(
            task.credentials
                .superuser_password
                .as_ref()
                .unwrap()
                .expose_secret(),
            "enablepw"
        );
        assert_eq!(task.output, OutputMode::SingleFile(PathBuf::from("/tmp/out")));
        assert_eq!(task.devices[0].port, 830);
        assert_eq!(task.devices[1].port, 2222);
        assert_eq!(task.settings.quiet_period, Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_type_degrades_to_default() {
        let json = task_json("").replace("ciscoios", "ciscoXR");
        let task = TaskFile::from_json(&json)
            .unwrap()
            .into_task(&XorHexCredentials)
            .unwrap();
        assert_eq!(task.device_type, DeviceType::Default);
    }

    #[test]
    fn test_validate() {
        let mut task = TaskFile::from_json(&task_json(""))
            .unwrap()
            .into_task(&XorHexCredentials)
            .unwrap();
        assert!(task.validate().is_ok());

        let dir = tempfile::tempdir().unwrap();
        task.output = OutputMode::PerDevice(dir.path().join("nested/out"));
        task.log_dir = Some(dir.path().join("logs"));
        assert!(task.validate().is_ok());
        assert!(dir.path().join("nested/out").is_dir());

        task.commands.clear();
        assert!(matches!(
            task.validate(),
            Err(crate::Error::Task(TaskError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_missing_required_field() {
        assert!(TaskFile::from_json(r#"{"name": "x"}"#).is_err());
    }
}
