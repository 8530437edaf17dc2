//! Device session strategies.
//!
//! A strategy shapes the session around the operator's commands for one
//! device type: what to send right after connecting, how to become
//! superuser, and what to send before disconnecting. The device runner only
//! talks to [`SessionStrategy`]; new device types are new variants of
//! [`DeviceType`] plus a module under [`vendors`].

pub mod vendors;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use regex::bytes::Regex;
use secrecy::SecretString;

use crate::channel::PatternBuffer;
use crate::credentials::Credentials;
use crate::error::{StrategyError, TransportError};
use crate::task::SessionSettings;
use crate::transport::SessionIo;

use vendors::{CiscoIos, CiscoWlc, Linux};

/// The three-step session shape of a device type.
pub trait SessionStrategy: Send + Sync {
    /// Runs after transport authentication, before any task command.
    /// Returns output to append to the transcript.
    fn on_connect<S: SessionIo>(
        &self,
        session: &mut S,
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> impl Future<Output = Result<Vec<u8>, StrategyError>> + Send;

    /// Elevate privileges inside the open session. `Ok(())` means a
    /// privileged state was reached (or the type has no such mechanism).
    fn escalate<S: SessionIo>(
        &self,
        session: &mut S,
        password: &SecretString,
        settings: &SessionSettings,
    ) -> impl Future<Output = Result<(), StrategyError>> + Send;

    /// Runs after the last task command, before the transport is closed.
    /// Returns output to append to the transcript.
    fn on_disconnect<S: SessionIo>(
        &self,
        session: &mut S,
        settings: &SessionSettings,
    ) -> impl Future<Output = Result<Vec<u8>, StrategyError>> + Send;
}

/// Plain SSH session: no extra steps at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl SessionStrategy for Plain {
    async fn on_connect<S: SessionIo>(
        &self,
        _session: &mut S,
        _credentials: &Credentials,
        _settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        Ok(Vec::new())
    }

    async fn escalate<S: SessionIo>(
        &self,
        _session: &mut S,
        _password: &SecretString,
        _settings: &SessionSettings,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    async fn on_disconnect<S: SessionIo>(
        &self,
        _session: &mut S,
        _settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        Ok(Vec::new())
    }
}

/// Known device types, selected by the task's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    CiscoIos,
    CiscoWlc,
    Linux,
    #[default]
    Default,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [
        DeviceType::CiscoIos,
        DeviceType::CiscoWlc,
        DeviceType::Linux,
        DeviceType::Default,
    ];

    /// Look up a type tag, ignoring ASCII case.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag().eq_ignore_ascii_case(tag.trim()))
    }

    /// Like [`DeviceType::parse`], but an unknown or empty tag selects
    /// [`DeviceType::Default`], degrading to a plain SSH session.
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().is_empty() {
            return Self::Default;
        }
        Self::parse(tag).unwrap_or_else(|| {
            warn!(
                "unknown device type '{}', using a plain '{}' session",
                tag,
                Self::Default.tag()
            );
            Self::Default
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::CiscoIos => "ciscoIOS",
            Self::CiscoWlc => "ciscoWLC",
            Self::Linux => "linux",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl SessionStrategy for DeviceType {
    async fn on_connect<S: SessionIo>(
        &self,
        session: &mut S,
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        match self {
            Self::CiscoIos => CiscoIos.on_connect(session, credentials, settings).await,
            Self::CiscoWlc => CiscoWlc.on_connect(session, credentials, settings).await,
            Self::Linux => Linux.on_connect(session, credentials, settings).await,
            Self::Default => Plain.on_connect(session, credentials, settings).await,
        }
    }

    async fn escalate<S: SessionIo>(
        &self,
        session: &mut S,
        password: &SecretString,
        settings: &SessionSettings,
    ) -> Result<(), StrategyError> {
        match self {
            Self::CiscoIos => CiscoIos.escalate(session, password, settings).await,
            Self::CiscoWlc => CiscoWlc.escalate(session, password, settings).await,
            Self::Linux => Linux.escalate(session, password, settings).await,
            Self::Default => Plain.escalate(session, password, settings).await,
        }
    }

    async fn on_disconnect<S: SessionIo>(
        &self,
        session: &mut S,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        match self {
            Self::CiscoIos => CiscoIos.on_disconnect(session, settings).await,
            Self::CiscoWlc => CiscoWlc.on_disconnect(session, settings).await,
            Self::Linux => Linux.on_disconnect(session, settings).await,
            Self::Default => Plain.on_disconnect(session, settings).await,
        }
    }
}

/// Send one line and collect the reply.
pub(crate) async fn exchange<S: SessionIo>(
    session: &mut S,
    line: &str,
    settings: &SessionSettings,
) -> Result<Vec<u8>, TransportError> {
    session.send_line(line).await?;
    session.drain(settings.quiet_period).await
}

/// Keep draining into `buffer` until `pattern` shows up in its tail.
///
/// Gives up when a drain comes back empty (the device went quiet without
/// printing the pattern) or when `timeout` elapses.
pub(crate) async fn wait_for<S: SessionIo>(
    session: &mut S,
    buffer: &mut PatternBuffer,
    pattern: &Regex,
    quiet_period: Duration,
    timeout: Duration,
) -> Result<bool, TransportError> {
    if buffer.tail_contains(pattern) {
        return Ok(true);
    }

    match tokio::time::timeout(timeout, drain_until(session, buffer, pattern, quiet_period)).await {
        Ok(found) => found,
        Err(_) => {
            debug!("pattern {:?} not seen within {:?}", pattern.as_str(), timeout);
            Ok(false)
        }
    }
}

async fn drain_until<S: SessionIo>(
    session: &mut S,
    buffer: &mut PatternBuffer,
    pattern: &Regex,
    quiet_period: Duration,
) -> Result<bool, TransportError> {
    loop {
        let chunk = session.drain(quiet_period).await?;
        if chunk.is_empty() {
            return Ok(false);
        }
        buffer.extend(&chunk);
        if buffer.tail_contains(pattern) {
            return Ok(true);
        }
    }
}

/// Password prompt shared by `enable` and `su`.
pub(crate) fn password_prompt() -> &'static Regex {
    static PATTERN: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"(?i)password:\s*$").unwrap());
    &PATTERN
}
