//! Output buffering for prompt detection.
//!
//! Transcripts keep the raw bytes a device sends. Decisions that depend on
//! what the device printed (did a password prompt appear, did we reach a
//! privileged prompt) are made on a cleaned copy held in a
//! [`PatternBuffer`].

mod buffer;

pub use buffer::PatternBuffer;
