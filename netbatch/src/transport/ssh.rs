//! SSH transport implementation using russh.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace, warn};
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use super::config::{HostKeyVerification, SshConfig};
use super::{SessionIo, Transport};
use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::task::{Device, SessionSettings};

/// Keyboard-interactive rounds answered with the password before giving up.
const MAX_KBD_INTERACTIVE_ROUNDS: usize = 3;

/// Opens russh-backed interactive shell sessions.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    known_hosts_path: Option<PathBuf>,
}

impl SshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific known_hosts file instead of `~/.ssh/known_hosts`.
    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

impl Transport for SshTransport {
    type Session = SshSession;

    async fn connect(
        &self,
        device: &Device,
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> Result<SshSession, TransportError> {
        let mut config = SshConfig::new(device, credentials, settings);
        config.known_hosts_path = self.known_hosts_path.clone();

        let timeout = config.timeout;
        tokio::time::timeout(timeout, SshSession::open(config))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

/// One authenticated SSH connection with a PTY shell channel.
pub struct SshSession {
    /// The russh session handle.
    handle: Handle<SshHandler>,

    /// Interactive shell channel.
    channel: Channel<Msg>,

    host: String,

    drain_timeout: Duration,

    /// Set once the peer has closed the channel.
    closed: bool,
}

impl SshSession {
    async fn open(config: SshConfig) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let mut handle = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| {
                // Prefer the detailed host-key error stored by the handler
                if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                    return hk_err;
                }
                match e {
                    russh::Error::IO(source) => TransportError::ConnectionFailed {
                        host: config.host.clone(),
                        port: config.port,
                        source,
                    },
                    other => TransportError::Ssh(other),
                }
            })?;

        Self::authenticate(&mut handle, &config).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::ShellFailed(e.to_string()))?;

        channel
            .request_pty(
                true,
                "vt100",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| TransportError::ShellFailed(e.to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| TransportError::ShellFailed(e.to_string()))?;

        debug!("shell open on {}", config.socket_addr());

        Ok(Self {
            handle,
            channel,
            host: config.host,
            drain_timeout: config.drain_timeout,
            closed: false,
        })
    }

    /// Password authentication, falling back to keyboard-interactive for
    /// devices that only offer the latter.
    async fn authenticate(
        handle: &mut Handle<SshHandler>,
        config: &SshConfig,
    ) -> Result<(), TransportError> {
        let password = config.password.expose_secret();

        let accepted = handle
            .authenticate_password(config.username.as_str(), password)
            .await?
            .success();
        if accepted {
            return Ok(());
        }

        debug!(
            "password auth rejected on {}, trying keyboard-interactive",
            config.host
        );

        let mut response = handle
            .authenticate_keyboard_interactive_start(config.username.as_str(), None::<String>)
            .await?;

        for _ in 0..MAX_KBD_INTERACTIVE_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(()),
                KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                    let answers = prompts.iter().map(|_| password.to_string()).collect();
                    response = handle
                        .authenticate_keyboard_interactive_respond(answers)
                        .await?;
                }
                _ => break,
            }
        }

        Err(TransportError::AuthenticationFailed {
            user: config.username.clone(),
        })
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            debug!("{}: channel closed by peer", self.host);
            self.closed = true;
        }
    }
}

impl SessionIo for SshSession {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }

        let payload = format!("{}\n", line);
        trace!("{}: sending {} bytes", self.host, payload.len());

        if let Err(e) = self.channel.data(payload.as_bytes()).await {
            let err = TransportError::Ssh(e);
            if err.is_disconnect() {
                self.mark_closed();
                return Err(TransportError::Disconnected);
            }
            return Err(err);
        }
        Ok(())
    }

    async fn drain(&mut self, quiet_period: Duration) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }

        let out = collect(&mut self.channel, quiet_period, self.drain_timeout).await;
        if out.closed {
            self.mark_closed();
        } else if out.timed_out {
            warn!(
                "{}: output did not settle within {:?}",
                self.host, self.drain_timeout
            );
        }

        trace!("{}: drained {} bytes", self.host, out.data.len());
        Ok(out.data.to_vec())
    }

    fn is_alive(&self) -> bool {
        !self.closed && !self.handle.is_closed()
    }

    async fn close(self) -> Result<(), TransportError> {
        if !self.closed {
            let _ = self.channel.close().await;
        }
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// What a shell channel yields while being drained.
#[derive(Debug)]
enum Incoming {
    Output(Vec<u8>),
    Closed,
    Ignored,
}

/// Anything `collect` can read shell output from.
trait OutputSource: Send {
    fn next(&mut self) -> impl Future<Output = Incoming> + Send;
}

impl OutputSource for Channel<Msg> {
    async fn next(&mut self) -> Incoming {
        match self.wait().await {
            Some(ChannelMsg::Data { data }) => Incoming::Output(data.to_vec()),
            Some(ChannelMsg::ExtendedData { data, .. }) => Incoming::Output(data.to_vec()),
            Some(ChannelMsg::Eof | ChannelMsg::Close) | None => Incoming::Closed,
            Some(_) => Incoming::Ignored,
        }
    }
}

/// Output gathered by one drain.
#[derive(Debug, Default)]
struct Collected {
    data: BytesMut,
    /// The source closed; `data` holds what arrived before.
    closed: bool,
    /// The ceiling elapsed while the device was still talking.
    timed_out: bool,
}

/// Read until `quiet` passes with no output, the source closes, or
/// `ceiling` elapses.
async fn collect<O: OutputSource>(source: &mut O, quiet: Duration, ceiling: Duration) -> Collected {
    let mut out = Collected::default();
    let deadline = Instant::now() + ceiling;

    loop {
        let now = Instant::now();
        if now >= deadline {
            out.timed_out = true;
            return out;
        }

        let wait = quiet.min(deadline - now);
        match tokio::time::timeout(wait, source.next()).await {
            // Silent for the whole wait; short waits only happen at the ceiling
            Err(_) => {
                out.timed_out = wait < quiet;
                return out;
            }
            Ok(Incoming::Output(data)) => out.data.extend_from_slice(&data),
            Ok(Incoming::Closed) => {
                out.closed = true;
                return out;
            }
            Ok(Incoming::Ignored) => {}
        }
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host-key error for connect() to surface instead of the
    /// generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Returns `Ok(true)` if matched, `Ok(false)` if the host is not listed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
