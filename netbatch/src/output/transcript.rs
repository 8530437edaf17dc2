//! Transcript destinations and file naming.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::error::OutputError;
use crate::task::{Device, OutputMode};

const BLOCK_END: &str = "--------------------------------------------------";

/// Keep only `[-a-zA-Z0-9_.]`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.txt`, prefix sanitised.
pub fn timestamped_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.txt", sanitize(prefix), at.format("%Y%m%d_%H%M%S"))
}

/// One device's transcript wrapped in hostname banners.
///
/// ```text
/// ----------------<hostname>--------------
/// <raw session output>
/// --------------------------------------------------
/// ```
pub fn render_block(hostname: &str, transcript: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(transcript.len() + 128);
    block.extend_from_slice(format!("\n----------------{}--------------\n", hostname).as_bytes());
    block.extend_from_slice(transcript);
    block.extend_from_slice(format!("\n{}\n", BLOCK_END).as_bytes());
    block
}

/// Receives each device's transcript as soon as the device is finished.
pub enum TranscriptSink {
    /// Delimited blocks on a stream, normally stdout.
    Stream(Box<dyn Write + Send>),
    /// Delimited blocks in one file for the whole run.
    Combined {
        path: PathBuf,
        file: BufWriter<File>,
    },
    /// One undelimited file per device.
    PerDevice { dir: PathBuf },
}

impl TranscriptSink {
    /// Open the destination an [`OutputMode`] asks for.
    pub fn open(
        mode: &OutputMode,
        task_name: &str,
        started: DateTime<Local>,
    ) -> Result<Self, OutputError> {
        match mode {
            OutputMode::Stdout => Ok(Self::stdout()),
            OutputMode::SingleFile(dir) => Self::combined(dir, task_name, started),
            OutputMode::PerDevice(dir) => Ok(Self::per_device(dir)),
        }
    }

    pub fn stdout() -> Self {
        Self::Stream(Box::new(io::stdout()))
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self::Stream(Box::new(writer))
    }

    /// `<dir>/<task>_OUT_<YYYYMMDD>_<HHMMSS>.txt`
    pub fn combined(
        dir: &Path,
        task_name: &str,
        started: DateTime<Local>,
    ) -> Result<Self, OutputError> {
        let path = dir.join(timestamped_name(&format!("{}_OUT", task_name), started));
        let file = File::create(&path).map_err(|source| OutputError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self::Combined {
            path,
            file: BufWriter::new(file),
        })
    }

    pub fn per_device(dir: impl Into<PathBuf>) -> Self {
        Self::PerDevice { dir: dir.into() }
    }

    /// The combined file, if this sink writes one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Combined { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Write one device's transcript. Returns the file it went to, if any.
    pub fn write(
        &mut self,
        device: &Device,
        transcript: &[u8],
    ) -> Result<Option<PathBuf>, OutputError> {
        match self {
            Self::Stream(out) => {
                out.write_all(&render_block(&device.to_string(), transcript))?;
                out.flush()?;
                Ok(None)
            }
            Self::Combined { path, file } => {
                file.write_all(&render_block(&device.to_string(), transcript))?;
                file.flush()?;
                Ok(Some(path.clone()))
            }
            Self::PerDevice { dir } => {
                let path = write_device_file(dir, device, transcript)?;
                Ok(Some(path))
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        match self {
            Self::Stream(out) => out.flush()?,
            Self::Combined { file, .. } => file.flush()?,
            Self::PerDevice { .. } => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for TranscriptSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream"),
            Self::Combined { path, .. } => f.debug_struct("Combined").field("path", path).finish(),
            Self::PerDevice { dir } => f.debug_struct("PerDevice").field("dir", dir).finish(),
        }
    }
}

/// `<dir>/<identity>_<YYYYMMDD>_<HHMMSS>.txt`, stamped at write time.
///
/// A device listed twice within the same second gets a `-<n>` suffix
/// instead of overwriting the earlier file.
fn write_device_file(dir: &Path, device: &Device, transcript: &[u8]) -> Result<PathBuf, OutputError> {
    let name = timestamped_name(&device.identity(), Local::now());
    let stem = name.trim_end_matches(".txt").to_string();

    let mut path = dir.join(&name);
    let mut n = 1;
    let mut file = loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                path = dir.join(format!("{}-{}.txt", stem, n));
                n += 1;
            }
            Err(source) => return Err(OutputError::Open { path, source }),
        }
    };

    debug!("writing transcript of {} to {}", device, path.display());
    file.write_all(transcript)?;
    file.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuf;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("core-sw1.lab_2222"), "core-sw1.lab_2222");
        assert_eq!(sanitize("weekly backup/../x"), "weeklybackup..x");
        assert_eq!(sanitize("fe80::1"), "fe801");
    }

    #[test]
    fn test_timestamped_name() {
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(timestamped_name("r1", at), "r1_20240102_030405.txt");
        assert_eq!(timestamped_name("nightly_OUT", at), "nightly_OUT_20240102_030405.txt");
    }

    #[test]
    fn test_render_block() {
        let block = render_block("r1", b"show clock\r\n10:00");
        assert_eq!(
            String::from_utf8(block).unwrap(),
            "\n----------------r1--------------\nshow clock\r\n10:00\n\
             --------------------------------------------------\n"
        );
    }

    #[test]
    fn test_stream_blocks_in_order() {
        let buf = SharedBuf::default();
        let mut sink = TranscriptSink::to_writer(buf.clone());
        assert_eq!(sink.write(&Device::new("a", 22), b"one").unwrap(), None);
        sink.write(&Device::new("b", 2222), b"two").unwrap();

        let text = buf.contents();
        let a = text.find("----------------a--------------").unwrap();
        let b = text.find("----------------b:2222--------------").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_combined_file() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut sink = TranscriptSink::combined(dir.path(), "nightly", started).unwrap();
        sink.write(&Device::new("a", 22), b"one").unwrap();
        let written = sink.write(&Device::new("b", 22), b"two").unwrap().unwrap();
        sink.flush().unwrap();

        assert_eq!(
            written.file_name().unwrap().to_str().unwrap(),
            "nightly_OUT_20240102_030405.txt"
        );
        let text = std::fs::read_to_string(written).unwrap();
        assert_eq!(text.matches(BLOCK_END).count(), 2);
    }

    #[test]
    fn test_per_device_files_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = TranscriptSink::per_device(dir.path());
        let device = Device::new("r1", 22);

        let first = sink.write(&device, b"first").unwrap().unwrap();
        let second = sink.write(&device, b"second").unwrap().unwrap();

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_str().unwrap().starts_with("r1_"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }
}
