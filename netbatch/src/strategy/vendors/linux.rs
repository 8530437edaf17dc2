//! Linux/Unix hosts, escalating with `su`.
//!
//! Standard shells show `$` for users and `#` for root:
//!
//! ```text
//! ops@web01:~$ su
//! Password:
//! root@web01:/home/ops#
//! ```

use std::sync::LazyLock;

use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::PatternBuffer;
use crate::credentials::Credentials;
use crate::error::StrategyError;
use crate::strategy::{SessionStrategy, exchange, password_prompt, wait_for};
use crate::task::SessionSettings;
use crate::transport::SessionIo;

const ESCALATE_COMMAND: &str = "su";

/// A prompt naming root, or any `#` prompt.
static ROOT_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:root.*[#$%]|#)\s*$").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct Linux;

impl SessionStrategy for Linux {
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
        session: &mut S,
        password: &SecretString,
        settings: &SessionSettings,
    ) -> Result<(), StrategyError> {
        let failed = || StrategyError::EscalationFailed {
            command: ESCALATE_COMMAND.to_string(),
        };

        let mut buffer = PatternBuffer::default();
        buffer.extend(&exchange(session, ESCALATE_COMMAND, settings).await?);

        let prompted = wait_for(
            session,
            &mut buffer,
            password_prompt(),
            settings.quiet_period,
            settings.escalation_timeout,
        )
        .await?;
        if !prompted {
            return Err(failed());
        }

        session.send_line(password.expose_secret()).await?;
        buffer.clear();

        let root = wait_for(
            session,
            &mut buffer,
            &ROOT_PROMPT,
            settings.quiet_period,
            settings.escalation_timeout,
        )
        .await?;
        if root { Ok(()) } else { Err(failed()) }
    }

    async fn on_disconnect<S: SessionIo>(
        &self,
        session: &mut S,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        Ok(exchange(session, "logout", settings).await?)
    }
}
