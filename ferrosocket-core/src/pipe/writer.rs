use super::buffer::FlushResult;
use super::Shared;
use bytes::BytesMut;
use ferrosocket_common::{Result, SocketError};
use std::sync::Arc;

/// Producer side of a [`Pipe`](super::Pipe)
///
/// Bytes committed with [`advance`](Self::advance) are staged locally and
/// only become visible to the reader on [`flush`](Self::flush).
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    staging: BytesMut,
    /// Start of the segment handed out by the last `get_memory`
    reserved_from: Option<usize>,
}

impl PipeWriter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            staging: BytesMut::new(),
            reserved_from: None,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.lock().writer_completed {
            return Err(SocketError::InvalidState(
                "writing is not allowed after the writer was completed".into(),
            ));
        }
        Ok(())
    }

    /// Drop a segment that was handed out but never advanced.
    fn release_reservation(&mut self) {
        if let Some(start) = self.reserved_from.take() {
            self.staging.truncate(start);
        }
    }

    /// Writable segment of at least `size_hint` bytes (and at least the
    /// pipe's minimum segment size).
    pub fn get_memory(&mut self, size_hint: usize) -> Result<&mut [u8]> {
        self.ensure_open()?;
        self.release_reservation();

        let size = size_hint.max(self.shared.options.minimum_segment_size);
        let start = self.staging.len();
        self.staging.resize(start + size, 0);
        self.reserved_from = Some(start);
        Ok(&mut self.staging[start..])
    }

    /// Commit `count` bytes written into the last segment.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        self.ensure_open()?;
        let Some(start) = self.reserved_from.take() else {
            if count == 0 {
                return Ok(());
            }
            return Err(SocketError::InvalidState(
                "advance called without an outstanding segment".into(),
            ));
        };

        if count > self.staging.len() - start {
            self.staging.truncate(start);
            return Err(SocketError::InvalidState(
                "cannot advance past the end of the segment".into(),
            ));
        }
        self.staging.truncate(start + count);
        Ok(())
    }

    /// Bytes committed but not yet flushed
    pub fn unflushed_len(&self) -> usize {
        self.reserved_from.unwrap_or(self.staging.len())
    }

    /// Publish staged bytes to the reader.
    ///
    /// On a bounded pipe, waits while unread bytes are at or above the pause
    /// threshold until they drop to the resume threshold, the reader
    /// completes, or the flush is cancelled.
    pub async fn flush(&mut self) -> Result<FlushResult> {
        self.ensure_open()?;
        self.release_reservation();
        let data = self.staging.split().freeze();

        {
            let mut state = self.shared.lock();
            if state.reader_completed {
                return Ok(FlushResult {
                    is_completed: true,
                    is_canceled: false,
                });
            }
            if !data.is_empty() {
                state.unread += data.len();
                state.segments.push_back(data);
                state.examined_all = false;
            }
        }
        self.shared.reader_wake.notify_one();

        let Some(pause) = self.shared.options.pause_writer_threshold else {
            return Ok(FlushResult::default());
        };
        let resume = self.shared.options.resume_writer_threshold;

        let mut paused = false;
        loop {
            {
                let mut state = self.shared.lock();
                if std::mem::take(&mut state.flush_canceled) {
                    return Ok(FlushResult {
                        is_completed: state.reader_completed,
                        is_canceled: true,
                    });
                }
                if state.reader_completed {
                    return Ok(FlushResult {
                        is_completed: true,
                        is_canceled: false,
                    });
                }
                if !paused && state.unread < pause {
                    return Ok(FlushResult::default());
                }
                paused = true;
                if state.unread <= resume {
                    return Ok(FlushResult::default());
                }
            }
            self.shared.writer_wake.notified().await;
        }
    }

    /// Copy `data` into the pipe and flush it.
    pub async fn write(&mut self, data: &[u8]) -> Result<FlushResult> {
        self.ensure_open()?;
        self.release_reservation();
        self.staging.extend_from_slice(data);
        self.flush().await
    }

    /// Make the pending (or next) flush return with `is_canceled` set.
    pub fn cancel_pending_flush(&self) {
        self.shared.lock().flush_canceled = true;
        self.shared.writer_wake.notify_one();
    }

    /// Complete the producer side. Safe to call repeatedly.
    pub fn complete(&self) {
        self.shared.complete_writer();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.complete_writer();
    }
}

#[cfg(test)]
mod tests {
    use crate::pipe::Pipe;
    use ferrosocket_common::PipeOptions;

    #[test]
    fn test_get_memory_respects_minimum_segment_size() {
        let pipe = Pipe::new(PipeOptions::unbounded().with_minimum_segment_size(64)).unwrap();
        let mut writer = pipe.writer();
        assert_eq!(writer.get_memory(1).unwrap().len(), 64);
        assert_eq!(writer.get_memory(100).unwrap().len(), 100);
    }

    #[test]
    fn test_unadvanced_segment_is_discarded() {
        let pipe = Pipe::unbounded();
        let mut writer = pipe.writer();

        writer.get_memory(8).unwrap()[..2].copy_from_slice(b"ok");
        writer.advance(2).unwrap();
        writer.get_memory(8).unwrap();
        assert_eq!(writer.unflushed_len(), 2);

        writer.get_memory(8).unwrap();
        assert!(writer.advance(10_000).is_err());
        assert_eq!(writer.unflushed_len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_pending_flush() {
        let pipe = Pipe::new(PipeOptions::bounded(1, 0)).unwrap();
        let mut writer = pipe.writer();
        writer.cancel_pending_flush();

        let result = writer.write(b"blocked").await.unwrap();
        assert!(result.is_canceled);
    }

    #[tokio::test]
    async fn test_multiple_advances_flush_as_one_publish() {
        let pipe = Pipe::unbounded();
        let mut writer = pipe.writer();
        let reader = pipe.reader();

        for chunk in [b"ab", b"cd", b"ef"] {
            let memory = writer.get_memory(2).unwrap();
            memory[..2].copy_from_slice(chunk);
            writer.advance(2).unwrap();
        }
        assert!(reader.try_read().unwrap().is_none());

        writer.flush().await.unwrap();
        let result = reader.read().await.unwrap();
        assert_eq!(&result.buffer.to_bytes()[..], b"abcdef");
    }
}
