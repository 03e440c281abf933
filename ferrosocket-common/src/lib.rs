//! Common utilities and types for `FerroSocket`

pub mod config;
pub mod constants;
pub mod error;

pub use config::{DuplexOptions, OutboundMode, PipeOptions, Role};
pub use constants::{
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_PAUSE_WRITER_THRESHOLD, DEFAULT_RESUME_WRITER_THRESHOLD,
    DEFAULT_SEGMENT_SIZE,
};
pub use error::{Result, SocketError};
