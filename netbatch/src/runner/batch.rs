//! The batch: every device of a task, one after another.

use chrono::Local;
use log::{info, warn};

use super::device::DeviceRunner;
use super::result::{BatchSummary, DeviceReport};
use crate::error::Result;
use crate::output::{LogEvent, RunLog, TranscriptSink};
use crate::task::Task;
use crate::transport::{SshTransport, Transport};

/// Runs a task's devices strictly in list order.
///
/// A device's transcript and log events are written before the next
/// device is connected, so both sinks follow the device list order.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner<T: Transport> {
    transport: T,
}

impl<T: Transport> BatchRunner<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every device of `task`.
    ///
    /// Device failures are recorded in the summary and never stop the
    /// batch. Neither do write failures once the log has started: they are
    /// logged, collected in [`BatchSummary::sink_errors`] and the next
    /// device still runs. Only a failure to start the log is returned.
    pub async fn run(
        &self,
        task: &Task,
        transcripts: &mut TranscriptSink,
        log: &mut RunLog,
    ) -> Result<BatchSummary> {
        let started = Local::now();
        info!(
            "running task '{}' on {} device(s)",
            task.name,
            task.devices.len()
        );
        log.start()?;

        let runner = DeviceRunner::new(&self.transport, task);
        let mut reports = Vec::with_capacity(task.devices.len());
        let mut sink_errors = Vec::new();
        let mut sink_error = |what: String| {
            warn!("{}", what);
            sink_errors.push(what);
        };

        for device in &task.devices {
            let mut run = runner.run(device).await;

            let output_file = match &run.transcript {
                Some(transcript) => match transcripts.write(device, transcript) {
                    Ok(path) => path,
                    Err(e) => {
                        let message = format!("Unable to write output for {}: {}", device, e);
                        run.events.push(LogEvent::new(message.clone()));
                        sink_error(message);
                        None
                    }
                },
                None => None,
            };
            for event in run.events {
                if let Err(e) = log.append(event) {
                    sink_error(format!("Unable to write run log: {}", e));
                }
            }

            info!("{}: {}", device, run.result);
            reports.push(DeviceReport {
                device: run.device,
                result: run.result,
                commands_sent: run.commands_sent,
                output_file,
            });
        }

        if let Err(e) = log.finish() {
            sink_error(format!("Unable to write run log: {}", e));
        }
        if let Err(e) = transcripts.flush() {
            sink_error(format!("Unable to flush output: {}", e));
        }

        Ok(BatchSummary {
            task_name: task.name.clone(),
            started,
            finished: Local::now(),
            reports,
            log_file: log.path().map(|p| p.to_path_buf()),
            sink_errors,
        })
    }
}

/// Run `task` over SSH, with the sinks its output policy asks for.
///
/// The run log goes to `<log_dir>/<task>_<timestamp>.txt`, or to stdout
/// when the task has no log directory.
pub async fn run_batch(task: &Task) -> Result<BatchSummary> {
    let started = Local::now();
    let mut log = match &task.log_dir {
        Some(dir) => RunLog::create(dir, &task.name, started)?,
        None => RunLog::stdout(),
    };
    let mut transcripts = TranscriptSink::open(&task.output, &task.name, started)?;

    BatchRunner::new(SshTransport::new())
        .run(task, &mut transcripts, &mut log)
        .await
}
