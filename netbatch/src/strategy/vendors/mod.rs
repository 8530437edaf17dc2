//! Per-vendor session strategies.

mod cisco_ios;
mod cisco_wlc;
mod linux;

pub use cisco_ios::CiscoIos;
pub use cisco_wlc::CiscoWlc;
pub use linux::Linux;
