//! One device, end to end.

use log::{debug, info, warn};

use super::result::{DeviceRun, RunResult};
use crate::error::{ConnectFailure, StrategyError};
use crate::output::LogEvent;
use crate::strategy::SessionStrategy;
use crate::task::{Device, Task};
use crate::transport::{SessionIo, Transport};

/// Drives a single device through connect, login hook, escalation, the
/// task's commands, logout hook and close.
///
/// Every failure is turned into a [`RunResult`] and log events; nothing
/// escapes to the caller. There are no retries: one connection attempt and
/// one pass through the commands.
pub struct DeviceRunner<'a, T: Transport> {
    transport: &'a T,
    task: &'a Task,
}

impl<'a, T: Transport> DeviceRunner<'a, T> {
    pub fn new(transport: &'a T, task: &'a Task) -> Self {
        Self { transport, task }
    }

    pub async fn run(&self, device: &Device) -> DeviceRun {
        let task = self.task;
        let strategy = task.device_type;
        let settings = &task.settings;
        let mut run = DeviceRun {
            device: device.clone(),
            result: RunResult::Completed,
            commands_sent: 0,
            transcript: None,
            events: Vec::new(),
        };

        info!("connecting to {} as {} ({})", device, task.credentials.username, strategy);
        let mut session = match self
            .transport
            .connect(device, &task.credentials, settings)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!("connect to {} failed: {}", device, e);
                let (result, message) = match e.connect_failure() {
                    ConnectFailure::AuthRejected => (
                        RunResult::AuthFailed,
                        format!("Authentication failed at {}: {}", device, e),
                    ),
                    ConnectFailure::Unreachable | ConnectFailure::Timeout => (
                        RunResult::ConnectFailed,
                        format!("Connection error at {}: {}", device, e),
                    ),
                };
                run.result = result;
                run.events.push(LogEvent::new(message));
                return run;
            }
        };
        run.events.push(LogEvent::new(format!("Connected to {}", device)));

        let mut transcript = Vec::new();

        match strategy
            .on_connect(&mut session, &task.credentials, settings)
            .await
        {
            Ok(out) => transcript.extend(out),
            Err(StrategyError::LoginRejected { .. }) => {
                run.result = RunResult::AuthFailed;
                run.events.push(LogEvent::new(format!("Unable to login to {}", device)));
                close(session, device).await;
                return run;
            }
            Err(e) => {
                run.result = RunResult::ConnectionLost;
                run.events
                    .push(LogEvent::new(format!("Connection lost at {}: {}", device, e)));
            }
        }

        if run.result.is_completed() {
            if let Some(password) = &task.credentials.superuser_password {
                match strategy.escalate(&mut session, password, settings).await {
                    Ok(()) => {
                        run.events.push(LogEvent::new(format!("Superuser at {}", device)));
                    }
                    Err(e) => {
                        warn!("escalation on {} failed: {}", device, e);
                        run.result = RunResult::SuperuserFailed;
                        run.events
                            .push(LogEvent::new(format!("Superuser failed at {}", device)));
                        close(session, device).await;
                        run.transcript = Some(transcript);
                        return run;
                    }
                }
            }
        }

        let commands_ran = run.result.is_completed();
        if commands_ran {
            for command in &task.commands {
                if let Err(e) = session.send_line(command).await {
                    run.result = RunResult::ConnectionLost;
                    run.events
                        .push(LogEvent::new(format!("Connection lost at {}: {}", device, e)));
                    break;
                }
                run.commands_sent += 1;

                match session.drain(settings.quiet_period).await {
                    Ok(out) => transcript.extend(out),
                    Err(e) => {
                        run.result = RunResult::ConnectionLost;
                        run.events
                            .push(LogEvent::new(format!("Connection lost at {}: {}", device, e)));
                        break;
                    }
                }
            }
            debug!(
                "{}: sent {} of {} commands",
                device,
                run.commands_sent,
                task.commands.len()
            );
        }

        // A dropped session has nothing left to log out of.
        let reached_logout = run.result.is_completed() || session.is_alive();
        if reached_logout {
            match strategy.on_disconnect(&mut session, settings).await {
                Ok(out) => transcript.extend(out),
                Err(e) => {
                    debug!("logout hook on {} failed: {}", device, e);
                    run.events
                        .push(LogEvent::new(format!("Error while logging out at {}", device)));
                }
            }
        }

        close(session, device).await;
        if commands_ran && reached_logout {
            run.events
                .push(LogEvent::new(format!("Finished commands at {}", device)));
        }

        run.transcript = Some(transcript);
        run
    }
}

async fn close<S: SessionIo>(session: S, device: &Device) {
    if let Err(e) = session.close().await {
        debug!("closing session to {}: {}", device, e);
    }
}
