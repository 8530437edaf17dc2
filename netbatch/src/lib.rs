//! # netbatch
//!
//! Runs a fixed list of CLI commands over SSH against a batch of network
//! devices and Linux hosts, one device at a time, and records what every
//! device printed.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with a quiet-period heuristic to tell
//!   when a device has finished answering
//! - Device types with their own session shape: `ciscoIOS`, `ciscoWLC`,
//!   `linux` and plain `default`
//! - Superuser escalation (`enable`, `su`) before the commands run
//! - Per-device failure isolation: a dead device never stops the batch
//! - Transcripts to stdout, one combined file, or one file per device,
//!   plus a timestamped run log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netbatch::{Credentials, Device, DeviceType, OutputMode, SessionSettings, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netbatch::Error> {
//!     let task = Task {
//!         name: "clock".into(),
//!         description: String::new(),
//!         device_type: DeviceType::CiscoIos,
//!         credentials: Credentials::new("admin", "secret").with_superuser("enable"),
//!         commands: vec!["show clock".into()],
//!         devices: vec![Device::new("192.168.1.1", 22)],
//!         output: OutputMode::Stdout,
//!         log_dir: None,
//!         settings: SessionSettings::default(),
//!     };
//!
//!     let summary = netbatch::run_batch(&task).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod credentials;
pub mod error;
pub mod output;
pub mod runner;
pub mod strategy;
pub mod task;
pub mod transport;

// Re-export main types for convenience
pub use credentials::{CredentialProvider, Credentials, PlainCredentials, XorHexCredentials};
pub use error::{Error, Result};
pub use runner::{BatchRunner, BatchSummary, DeviceReport, DeviceRunner, RunResult, run_batch};
pub use strategy::{DeviceType, SessionStrategy};
pub use task::{Device, OutputMode, SessionSettings, Task, TaskFile};
pub use transport::{SessionIo, SshTransport, Transport};
