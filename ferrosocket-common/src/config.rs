//! Configuration types for `FerroSocket` pipes and duplex adapters

use crate::constants::{
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_PAUSE_WRITER_THRESHOLD, DEFAULT_RESUME_WRITER_THRESHOLD,
    DEFAULT_SEGMENT_SIZE,
};
use crate::error::{Result, SocketError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which end of the close handshake this side plays.
///
/// The initiator runs the full handshake (send close, wait for the peer's
/// close frame). The acceptor only sends its own close frame and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Side that opened the connection (typically the client)
    Initiator,
    /// Side that accepted the connection (typically the server)
    #[default]
    Acceptor,
}

/// How outbound bytes reach the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundMode {
    /// Bytes are written to an owned pipe and a pump batches them into frames
    #[default]
    Pump,
    /// Every write is sent immediately as one complete message
    PassThrough,
}

/// Sizing and backpressure for a byte pipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeOptions {
    /// Unread bytes at which `flush` suspends the writer (`None` = unbounded)
    pub pause_writer_threshold: Option<usize>,
    /// Unread bytes below which a suspended writer resumes
    pub resume_writer_threshold: usize,
    /// Minimum size of a segment returned by `get_memory`
    pub minimum_segment_size: usize,
}

impl PipeOptions {
    /// Unbounded pipe: `flush` never waits for the reader.
    pub fn unbounded() -> Self {
        Self {
            pause_writer_threshold: None,
            resume_writer_threshold: 0,
            minimum_segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }

    /// Bounded pipe that pauses at `pause` unread bytes and resumes below `resume`.
    pub fn bounded(pause: usize, resume: usize) -> Self {
        Self {
            pause_writer_threshold: Some(pause),
            resume_writer_threshold: resume,
            minimum_segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }

    #[must_use]
    pub fn with_minimum_segment_size(mut self, size: usize) -> Self {
        self.minimum_segment_size = size;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_segment_size == 0 {
            return Err(SocketError::Config(
                "minimum_segment_size must be greater than zero".into(),
            ));
        }
        if let Some(pause) = self.pause_writer_threshold {
            if pause == 0 {
                return Err(SocketError::Config(
                    "pause_writer_threshold must be greater than zero".into(),
                ));
            }
            if self.resume_writer_threshold > pause {
                return Err(SocketError::Config(format!(
                    "resume_writer_threshold ({}) exceeds pause_writer_threshold ({})",
                    self.resume_writer_threshold, pause
                )));
            }
        }
        Ok(())
    }
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Configuration for a duplex adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplexOptions {
    /// Close the connection when `complete` fires without an explicit status
    pub close_on_complete: bool,
    /// Close handshake role of this side
    pub role: Role,
    /// Outbound path variant
    pub outbound_mode: OutboundMode,
    /// Inbound pipe sizing (default: unbounded)
    pub inbound: PipeOptions,
    /// Outbound pipe sizing, used by [`OutboundMode::Pump`]
    pub outbound: PipeOptions,
    /// Buffer size requested from the inbound pipe for each received fragment
    pub receive_segment_size: usize,
    /// Upper bound on waiting for a close handshake to finish
    pub close_timeout: Duration,
}

impl DuplexOptions {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.receive_segment_size == 0 {
            return Err(SocketError::Config(
                "receive_segment_size must be greater than zero".into(),
            ));
        }
        if self.close_timeout.is_zero() {
            return Err(SocketError::Config(
                "close_timeout must be greater than zero".into(),
            ));
        }
        self.inbound.validate()?;
        self.outbound.validate()
    }
}

impl Default for DuplexOptions {
    fn default() -> Self {
        Self {
            close_on_complete: false,
            role: Role::default(),
            outbound_mode: OutboundMode::default(),
            inbound: PipeOptions::unbounded(),
            outbound: PipeOptions::bounded(
                DEFAULT_PAUSE_WRITER_THRESHOLD,
                DEFAULT_RESUME_WRITER_THRESHOLD,
            ),
            receive_segment_size: DEFAULT_SEGMENT_SIZE,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplex_defaults() {
        let options = DuplexOptions::default();
        assert!(!options.close_on_complete);
        assert_eq!(options.role, Role::Acceptor);
        assert_eq!(options.outbound_mode, OutboundMode::Pump);
        assert!(options.inbound.pause_writer_threshold.is_none());
        assert_eq!(options.close_timeout, Duration::from_millis(250));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_pipe_options_validation() {
        assert!(PipeOptions::bounded(10, 5).validate().is_ok());
        assert!(PipeOptions::bounded(10, 20).validate().is_err());
        assert!(PipeOptions::bounded(0, 0).validate().is_err());
        assert!(PipeOptions::unbounded()
            .with_minimum_segment_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_duplex_validation_rejects_zero_timeout() {
        let options = DuplexOptions {
            close_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(SocketError::Config(_))));
    }

    #[test]
    fn test_options_from_json() {
        let json = r#"{
            "close_on_complete": true,
            "role": "initiator",
            "outbound_mode": "pass_through",
            "inbound": {
                "pause_writer_threshold": null,
                "resume_writer_threshold": 0,
                "minimum_segment_size": 512
            },
            "outbound": {
                "pause_writer_threshold": 1024,
                "resume_writer_threshold": 512,
                "minimum_segment_size": 512
            },
            "receive_segment_size": 512,
            "close_timeout": { "secs": 1, "nanos": 0 }
        }"#;
        let options: DuplexOptions = serde_json::from_str(json).unwrap();
        assert!(options.close_on_complete);
        assert_eq!(options.role, Role::Initiator);
        assert_eq!(options.outbound_mode, OutboundMode::PassThrough);
        assert_eq!(options.outbound.pause_writer_threshold, Some(1024));
        assert_eq!(options.close_timeout, Duration::from_secs(1));
        assert!(options.validate().is_ok());
    }
}
