//! Cisco Wireless LAN Controller (AireOS).
//!
//! The controller asks for credentials a second time inside the shell after
//! the SSH handshake:
//!
//! ```text
//! (Cisco Controller)
//! User: admin
//! Password:********
//! (Cisco Controller) >
//! ```
//!
//! There is no separate privileged mode, so escalation is a no-op. On
//! logout the controller asks whether to save unsaved changes; the answer
//! is always `n`. Tasks that want changes persisted include `save config`
//! and `y` in their own command list.

use std::sync::LazyLock;

use log::debug;
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::PatternBuffer;
use crate::credentials::Credentials;
use crate::error::{StrategyError, TransportError};
use crate::strategy::{SessionStrategy, exchange, wait_for};
use crate::task::SessionSettings;
use crate::transport::SessionIo;

static EXEC_PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s*$").unwrap());

static SAVE_QUESTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)save.*\?.*$").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct CiscoWlc;

impl SessionStrategy for CiscoWlc {
    async fn on_connect<S: SessionIo>(
        &self,
        session: &mut S,
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        // A controller that hangs up instead of showing its prompt has
        // rejected the login just the same.
        let logged_in = match login(session, credentials, settings).await {
            Ok(found) => found,
            Err(e) => {
                debug!("session dropped during in-band login: {}", e);
                false
            }
        };
        if !logged_in {
            return Err(StrategyError::LoginRejected {
                expected: ">".to_string(),
            });
        }

        Ok(exchange(session, "config paging disable", settings).await?)
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
        session: &mut S,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        let mut out = exchange(session, "end", settings).await?;
        let exit = exchange(session, "exit", settings).await?;

        let mut buffer = PatternBuffer::default();
        buffer.extend(&exit);
        out.extend(exit);

        if buffer.tail_contains(&SAVE_QUESTION) {
            debug!("declining to save configuration on logout");
            out.extend(exchange(session, "n", settings).await?);
        }
        Ok(out)
    }
}

/// Answer the `User:`/`Password:` prompts and wait for the exec prompt.
/// The exchange is kept out of the transcript.
async fn login<S: SessionIo>(
    session: &mut S,
    credentials: &Credentials,
    settings: &SessionSettings,
) -> Result<bool, TransportError> {
    exchange(session, &credentials.username, settings).await?;
    session
        .send_line(credentials.password.expose_secret())
        .await?;

    let mut buffer = PatternBuffer::default();
    wait_for(
        session,
        &mut buffer,
        &EXEC_PROMPT,
        settings.quiet_period,
        settings.escalation_timeout,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Device;
    use crate::transport::Transport;
    use crate::transport::fake::{FakeTransport, HostScript};

    const PROMPT: &str = "(Cisco Controller) >";

    fn run<F, Fut, T>(script: HostScript, f: F) -> (T, Vec<String>)
    where
        F: FnOnce(crate::transport::fake::FakeSession, Credentials) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let transport = FakeTransport::new().host("wlc", script);
        let creds = Credentials::new("admin", "wlcpw").with_superuser("unused");
        let out = tokio_test::block_on(async {
            let session = transport
                .connect(&Device::new("wlc", 22), &creds, &SessionSettings::default())
                .await
                .unwrap();
            f(session, creds.clone()).await
        });
        (out, transport.sent_to("wlc"))
    }

    #[test]
    fn test_in_band_login() {
        let script = HostScript::default()
            .reply("admin", "Password:")
            .reply("wlcpw", PROMPT)
            .reply("config paging disable", PROMPT);

        let (out, sent) = run(script, |mut session, creds| async move {
            CiscoWlc
                .on_connect(&mut session, &creds, &SessionSettings::default())
                .await
        });

        let out = out.unwrap();
        assert!(!String::from_utf8_lossy(&out).contains("wlcpw"));
        assert_eq!(sent, vec!["admin", "wlcpw", "config paging disable"]);
    }

    #[test]
    fn test_in_band_login_rejected() {
        let script = HostScript::default()
            .reply("admin", "Password:")
            .reply("wlcpw", "Login incorrect\r\nUser:");

        let (out, sent) = run(script, |mut session, creds| async move {
            CiscoWlc
                .on_connect(&mut session, &creds, &SessionSettings::default())
                .await
        });

        assert!(matches!(out, Err(StrategyError::LoginRejected { .. })));
        assert_eq!(sent, vec!["admin", "wlcpw"]);
    }

    #[test]
    fn test_hang_up_during_login_is_a_rejection() {
        let script = HostScript {
            drop_after: Some(2),
            ..HostScript::default()
                .reply("admin", "Password:")
                .reply("wlcpw", "Login incorrect\r\n")
        };

        let (out, sent) = run(script, |mut session, creds| async move {
            CiscoWlc
                .on_connect(&mut session, &creds, &SessionSettings::default())
                .await
        });

        assert!(matches!(out, Err(StrategyError::LoginRejected { .. })));
        assert_eq!(sent, vec!["admin", "wlcpw"]);
    }

    #[test]
    fn test_escalation_is_noop() {
        let (out, sent) = run(HostScript::default(), |mut session, creds| async move {
            CiscoWlc
                .escalate(
                    &mut session,
                    creds.superuser_password.as_ref().unwrap(),
                    &SessionSettings::default(),
                )
                .await
        });
        assert!(out.is_ok());
        assert!(sent.is_empty());
    }

    #[test]
    fn test_logout_declines_save() {
        let script = HostScript::default()
            .reply("end", PROMPT)
            .reply(
                "exit",
                "The system has unsaved changes.\r\nWould you like to save them now? (y/N) ",
            );

        let (out, sent) = run(script, |mut session, _| async move {
            CiscoWlc
                .on_disconnect(&mut session, &SessionSettings::default())
                .await
        });
        assert!(out.is_ok());
        assert_eq!(sent, vec!["end", "exit", "n"]);
    }

    #[test]
    fn test_logout_without_question() {
        let script = HostScript::default().reply("end", PROMPT);
        let (out, sent) = run(script, |mut session, _| async move {
            CiscoWlc
                .on_disconnect(&mut session, &SessionSettings::default())
                .await
        });
        assert!(out.is_ok());
        assert_eq!(sent, vec!["end", "exit"]);
    }
}
