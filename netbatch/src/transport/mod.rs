//! Session transport: one authenticated interactive shell per device.
//!
//! [`Transport`] opens sessions; [`SessionIo`] is what the runner and the
//! device strategies drive. The SSH implementation lives in [`SshTransport`].
//!
//! There is no command-completion signal on an interactive shell, so
//! [`SessionIo::drain`] uses a quiet-period heuristic: it returns once the
//! device has been silent for the quiet period, or when the drain ceiling
//! elapses.

pub mod config;
#[cfg(test)]
pub(crate) mod fake;
mod ssh;

pub use config::{HostKeyVerification, SshConfig};
pub use ssh::{SshSession, SshTransport};

use std::future::Future;
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::task::{Device, SessionSettings};

/// Opens authenticated sessions to devices.
pub trait Transport: Send + Sync {
    type Session: SessionIo;

    /// Connect and authenticate. Bounded by the settings' connect timeout.
    fn connect(
        &self,
        device: &Device,
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// An open interactive session.
pub trait SessionIo: Send {
    /// Send one line of input, newline appended.
    fn send_line(&mut self, line: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Collect everything the device sends until it has been quiet for
    /// `quiet_period` (or the drain ceiling elapses).
    ///
    /// If the peer closes the session, output received before the close is
    /// still returned; the next call reports [`TransportError::Disconnected`].
    fn drain(
        &mut self,
        quiet_period: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Whether the session can still carry traffic.
    fn is_alive(&self) -> bool;

    /// Close the session and the underlying connection.
    fn close(self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
