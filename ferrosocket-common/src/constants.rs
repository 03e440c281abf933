//! Default tunables for FerroSocket pipes and duplex adapters.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across the core library, the facade builder, and tests.

use std::time::Duration;

/// Upper bound on waiting for the peer to acknowledge a close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(250);

/// Minimum size of a writable segment handed out by a pipe writer.
pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// Unread bytes at which a bounded pipe suspends its writer (64 KiB).
pub const DEFAULT_PAUSE_WRITER_THRESHOLD: usize = 64 * 1024;

/// Unread bytes below which a suspended writer resumes (32 KiB).
pub const DEFAULT_RESUME_WRITER_THRESHOLD: usize = 32 * 1024;
