//! Error types for netbatch.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netbatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device session strategy errors
    #[error("Session error: {0}")]
    Strategy(#[from] StrategyError),

    /// Task definition errors
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Credential decoding errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Transcript or log destination errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Transport layer errors (SSH connection, authentication, channel I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to reach the host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts file could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Failed to open the interactive shell channel
    #[error("Failed to open shell channel: {0}")]
    ShellFailed(String),

    /// Connection was closed by the peer
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why a connection attempt did not produce a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Host unreachable, refused, or the SSH handshake failed.
    Unreachable,
    /// Transport-level credential rejection.
    AuthRejected,
    /// The handshake did not finish in time.
    Timeout,
}

impl TransportError {
    /// Classify an error returned by a connect attempt.
    pub fn connect_failure(&self) -> ConnectFailure {
        match self {
            Self::AuthenticationFailed { .. } => ConnectFailure::AuthRejected,
            Self::Timeout(_) => ConnectFailure::Timeout,
            _ => ConnectFailure::Unreachable,
        }
    }

    /// Whether the error means the session is gone for good.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(_) | Self::ConnectionFailed { .. } => true,
            Self::Ssh(e) => matches!(
                e,
                russh::Error::Disconnect
                    | russh::Error::HUP
                    | russh::Error::IO(_)
                    | russh::Error::SendError
                    | russh::Error::ChannelOpenFailure(_)
            ),
            _ => false,
        }
    }
}

/// Device session strategy errors (in-band login, escalation, logout).
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The device did not present its prompt after an in-band login
    #[error("In-band login rejected: no '{expected}' prompt")]
    LoginRejected { expected: String },

    /// The escalation procedure did not reach a privileged prompt
    #[error("Escalation with '{command}' did not reach a privileged prompt")]
    EscalationFailed { command: String },

    /// Underlying transport failure during a strategy step
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Task definition errors.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task file could not be read
    #[error("Unable to read task file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Task file is not valid JSON or misses required fields
    #[error("Invalid task file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Task values failed validation
    #[error("Invalid task: {message}")]
    Invalid { message: String },

    /// Device address could not be parsed
    #[error("Invalid device address '{address}'")]
    InvalidAddress { address: String },
}

/// Credential decoding errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Ciphertext is not an even-length hex string
    #[error("Encrypted value is not valid hex")]
    InvalidHex,

    /// Decryption needs a non-empty key
    #[error("Empty decryption key")]
    EmptyKey,

    /// Decrypted bytes do not form valid characters
    #[error("Decrypted value is not valid text")]
    InvalidText,
}

/// Transcript or log destination errors.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Destination could not be created or opened
    #[error("Unable to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Write to an open destination failed
    #[error("Write failed: {0}")]
    Write(#[from] io::Error),
}

/// Result type alias using netbatch's Error.
pub type Result<T> = std::result::Result<T, Error>;
