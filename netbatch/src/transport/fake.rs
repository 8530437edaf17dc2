//! Scripted in-memory transport for tests.
//!
//! Every connect, send and close is recorded in one shared journal so tests
//! can assert on ordering across devices.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{SessionIo, Transport};
use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::task::{Device, SessionSettings};

/// One recorded transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect(String),
    Send(String, String),
    Close(String),
}

/// How a scripted host behaves.
#[derive(Debug, Clone, Default)]
pub struct HostScript {
    /// Refuse the connection.
    pub unreachable: bool,
    /// Reject the credentials.
    pub reject_auth: bool,
    /// Output available right after connecting (banner/prompt).
    pub banner: String,
    /// Output produced in reply to an exact input line.
    pub replies: HashMap<String, String>,
    /// Output for any line without a specific reply.
    pub default_reply: Option<String>,
    /// Drop the connection after this many lines were sent.
    pub drop_after: Option<usize>,
    /// Fail sending this exact line with a timeout; the session stays up.
    pub fail_on: Option<String>,
}

impl HostScript {
    pub fn reply(mut self, input: &str, output: &str) -> Self {
        self.replies.insert(input.to_string(), output.to_string());
        self
    }

    pub fn echo_prompt(mut self, prompt: &str) -> Self {
        self.default_reply = Some(prompt.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    scripts: HashMap<String, HostScript>,
    journal: Arc<Mutex<Vec<Op>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str, script: HostScript) -> Self {
        self.scripts.insert(host.to_string(), script);
        self
    }

    pub fn journal(&self) -> Vec<Op> {
        self.journal.lock().unwrap().clone()
    }

    /// Lines sent to one host, in order.
    pub fn sent_to(&self, host: &str) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                Op::Send(h, line) if h == host => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Hosts in the order they were connected to.
    pub fn connect_order(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                Op::Connect(h) => Some(h),
                _ => None,
            })
            .collect()
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn connect(
        &self,
        device: &Device,
        credentials: &Credentials,
        _settings: &SessionSettings,
    ) -> Result<FakeSession, TransportError> {
        let host = device.host.clone();
        self.journal.lock().unwrap().push(Op::Connect(host.clone()));

        let script = self.scripts.get(&host).cloned().unwrap_or_default();
        if script.unreachable {
            return Err(TransportError::ConnectionFailed {
                host,
                port: device.port,
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        if script.reject_auth {
            return Err(TransportError::AuthenticationFailed {
                user: credentials.username.clone(),
            });
        }

        Ok(FakeSession {
            pending: script.banner.clone().into_bytes(),
            host,
            script,
            sent: 0,
            closed: false,
            journal: self.journal.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FakeSession {
    host: String,
    script: HostScript,
    pending: Vec<u8>,
    sent: usize,
    closed: bool,
    journal: Arc<Mutex<Vec<Op>>>,
}

impl SessionIo for FakeSession {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        if self.script.fail_on.as_deref() == Some(line) {
            return Err(TransportError::Timeout(Duration::from_secs(1)));
        }
        self.journal
            .lock()
            .unwrap()
            .push(Op::Send(self.host.clone(), line.to_string()));
        self.sent += 1;

        self.pending.extend_from_slice(line.as_bytes());
        self.pending.extend_from_slice(b"\r\n");
        let reply = self
            .script
            .replies
            .get(line)
            .or(self.script.default_reply.as_ref());
        if let Some(reply) = reply {
            self.pending.extend_from_slice(reply.as_bytes());
        }

        if self.script.drop_after.is_some_and(|n| self.sent >= n) {
            self.closed = true;
        }
        Ok(())
    }

    async fn drain(&mut self, _quiet_period: Duration) -> Result<Vec<u8>, TransportError> {
        if self.closed && self.pending.is_empty() {
            return Err(TransportError::Disconnected);
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn is_alive(&self) -> bool {
        !self.closed
    }

    async fn close(self) -> Result<(), TransportError> {
        self.journal.lock().unwrap().push(Op::Close(self.host));
        Ok(())
    }
}
