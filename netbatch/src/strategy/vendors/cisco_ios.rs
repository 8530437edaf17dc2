//! Cisco IOS / IOS-XE switches and routers.
//!
//! ```text
//! router>                 # user exec, after login
//! router#                 # privileged exec, after `enable`
//! router(config)#         # configuration mode
//! ```
//!
//! Paging is turned off on connect so long outputs are not held behind
//! `--More--`. Logout leaves any configuration mode with `end` first.

use std::sync::LazyLock;

use log::debug;
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::PatternBuffer;
use crate::credentials::Credentials;
use crate::error::StrategyError;
use crate::strategy::{SessionStrategy, exchange, password_prompt, wait_for};
use crate::task::SessionSettings;
use crate::transport::SessionIo;

const ESCALATE_COMMAND: &str = "enable";

/// Privileged exec prompt; parentheses excluded so `(config)#` does not count.
static PRIVILEGED_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[\w.\-@/:]{1,63}#\s?$").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct CiscoIos;

impl SessionStrategy for CiscoIos {
    async fn on_connect<S: SessionIo>(
        &self,
        session: &mut S,
        _credentials: &Credentials,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        Ok(exchange(session, "terminal length 0", settings).await?)
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

        // No enable secret configured: already privileged
        if buffer.tail_contains(&PRIVILEGED_PROMPT) {
            return Ok(());
        }

        let prompted = wait_for(
            session,
            &mut buffer,
            password_prompt(),
            settings.quiet_period,
            settings.escalation_timeout,
        )
        .await?;
        if !prompted {
            debug!("no password prompt after '{}'", ESCALATE_COMMAND);
            return Err(failed());
        }

        session.send_line(password.expose_secret()).await?;
        buffer.clear();

        let privileged = wait_for(
            session,
            &mut buffer,
            &PRIVILEGED_PROMPT,
            settings.quiet_period,
            settings.escalation_timeout,
        )
        .await?;
        if privileged { Ok(()) } else { Err(failed()) }
    }

    async fn on_disconnect<S: SessionIo>(
        &self,
        session: &mut S,
        settings: &SessionSettings,
    ) -> Result<Vec<u8>, StrategyError> {
        let mut out = exchange(session, "end", settings).await?;
        out.extend(exchange(session, "exit", settings).await?);
        Ok(out)
    }
}
