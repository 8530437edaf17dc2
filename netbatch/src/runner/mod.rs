//! Running a task: the per-device session and the batch around it.

mod batch;
mod device;
mod result;

pub use batch::{BatchRunner, run_batch};
pub use device::DeviceRunner;
pub use result::{BatchSummary, DeviceReport, DeviceRun, RunResult};
