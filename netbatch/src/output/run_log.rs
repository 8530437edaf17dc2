//! Operator-facing run log.
//!
//! ```text
//! Running...
//! 10:02:11: Connected to 10.0.0.1
//! 10:02:19: Finished commands at 10.0.0.1
//! 10:02:19: Finished activity
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::transcript::timestamped_name;
use crate::error::OutputError;

const HEADER: &str = "Running...";
const FOOTER: &str = "Finished activity";

/// One timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }

    /// `HH:MM:SS: <message>`
    pub fn render(&self) -> String {
        format!("{}: {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Append-only log sink for one batch run.
///
/// Lines are written and flushed as they arrive; the events are also kept
/// in memory in arrival order.
pub struct RunLog {
    writer: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    events: Vec<LogEvent>,
}

impl RunLog {
    /// Log to the standard output stream.
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    /// Log to `<dir>/<task>_<YYYYMMDD>_<HHMMSS>.txt`.
    pub fn create(
        dir: &Path,
        task_name: &str,
        started: DateTime<Local>,
    ) -> Result<Self, OutputError> {
        let path = dir.join(timestamped_name(task_name, started));
        let file = File::create(&path).map_err(|source| OutputError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            path: Some(path),
            events: Vec::new(),
        })
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            path: None,
            events: Vec::new(),
        }
    }

    /// Log file path, `None` when logging to a stream.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Write the `Running...` header.
    pub fn start(&mut self) -> Result<(), OutputError> {
        self.write_line(HEADER)
    }

    /// Append an event produced elsewhere.
    ///
    /// Timestamps never go backwards in the log: an event stamped earlier
    /// than the previous one (wall clock adjusted mid-run) takes the
    /// previous timestamp.
    pub fn append(&mut self, mut event: LogEvent) -> Result<(), OutputError> {
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        }
        self.write_line(&event.render())?;
        self.events.push(event);
        Ok(())
    }

    pub fn record(&mut self, message: impl Into<String>) -> Result<(), OutputError> {
        self.append(LogEvent::new(message))
    }

    /// Record `Finished activity` and flush.
    pub fn finish(&mut self) -> Result<(), OutputError> {
        self.record(FOOTER)?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), OutputError> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("path", &self.path)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Mutex};

    /// Writer whose contents stay readable after being boxed into a sink.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_render() {
        let event = LogEvent {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap(),
            message: "Connected to r1".to_string(),
        };
        assert_eq!(event.render(), "07:05:03: Connected to r1");
    }

    #[test]
    fn test_layout() {
        let buf = SharedBuf::default();
        let mut log = RunLog::to_writer(buf.clone());
        log.start().unwrap();
        log.record("Connected to r1").unwrap();
        log.finish().unwrap();

        let text = buf.contents();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Running...");
        assert!(lines[1].ends_with(": Connected to r1"));
        assert!(lines[2].ends_with(": Finished activity"));
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut log = RunLog::to_writer(SharedBuf::default());
        let later = Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        log.append(LogEvent {
            timestamp: later,
            message: "first".to_string(),
        })
        .unwrap();
        log.append(LogEvent {
            timestamp: later - Duration::seconds(30),
            message: "second".to_string(),
        })
        .unwrap();

        assert_eq!(log.events()[1].timestamp, later);
    }

    #[test]
    fn test_log_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap();
        let mut log = RunLog::create(dir.path(), "weekly backup", started).unwrap();
        log.start().unwrap();
        log.finish().unwrap();

        let path = log.path().unwrap().to_path_buf();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "weeklybackup_20240309_143005.txt"
        );
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("Running...\n"));
    }
}
