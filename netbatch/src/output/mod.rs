//! Where a batch run writes its results.
//!
//! Two sinks live for the whole run: the [`RunLog`] of timestamped
//! [`LogEvent`]s and the [`TranscriptSink`] that receives each device's
//! session output once that device is finished.

mod run_log;
mod transcript;

pub use self::run_log::{LogEvent, RunLog};
pub use self::transcript::{TranscriptSink, render_block, sanitize, timestamped_name};

#[cfg(test)]
pub(crate) use self::run_log::tests::SharedBuf;
