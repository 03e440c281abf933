use super::buffer::{ReadBuffer, ReadResult};
use super::Shared;
use bytes::{Buf, Bytes};
use ferrosocket_common::{Result, SocketError};
use futures::Stream;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Consumer side of a [`Pipe`](super::Pipe)
///
/// Reads return every published, unconsumed byte. Call [`advance`](Self::advance)
/// or [`advance_to`](Self::advance_to) after each read to release consumed
/// bytes and tell the pipe how far the data was examined.
#[derive(Clone, Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Wait for unexamined data, writer completion, or cancellation.
    pub async fn read(&self) -> Result<ReadResult> {
        loop {
            if let Some(result) = self.try_read()? {
                return Ok(result);
            }
            self.shared.reader_wake.notified().await;
        }
    }

    /// Non-waiting variant of [`read`](Self::read).
    pub fn try_read(&self) -> Result<Option<ReadResult>> {
        let mut state = self.shared.lock();
        if state.reader_completed {
            return Err(SocketError::InvalidState(
                "reading is not allowed after the reader was completed".into(),
            ));
        }

        let is_canceled = std::mem::take(&mut state.read_canceled);
        let has_new_data = state.unread > 0 && !state.examined_all;
        if !(is_canceled || has_new_data || state.writer_completed) {
            return Ok(None);
        }

        let buffer = ReadBuffer::new(state.segments.iter().cloned().collect(), state.unread);
        Ok(Some(ReadResult {
            buffer,
            is_completed: state.writer_completed,
            is_canceled,
        }))
    }

    /// Release `consumed` bytes and mark `examined` bytes as seen.
    ///
    /// When everything available has been examined, the next read waits for
    /// new data even if unconsumed bytes remain.
    pub fn advance_to(&self, consumed: usize, examined: usize) -> Result<()> {
        if consumed > examined {
            return Err(SocketError::InvalidState(
                "consumed position is past the examined position".into(),
            ));
        }

        let wake_writer = {
            let mut state = self.shared.lock();
            if state.reader_completed {
                return Err(SocketError::InvalidState(
                    "advancing is not allowed after the reader was completed".into(),
                ));
            }
            if examined > state.unread {
                return Err(SocketError::InvalidState(
                    "cannot advance past the end of the buffer".into(),
                ));
            }

            state.examined_all = examined == state.unread;

            let mut remaining = consumed;
            while remaining > 0 {
                let Some(front) = state.segments.front_mut() else {
                    break;
                };
                if front.len() <= remaining {
                    remaining -= front.len();
                    state.segments.pop_front();
                } else {
                    front.advance(remaining);
                    remaining = 0;
                }
            }
            state.unread -= consumed;
            consumed > 0
        };

        if wake_writer {
            self.shared.writer_wake.notify_one();
        }
        Ok(())
    }

    /// Release and examine `consumed` bytes.
    pub fn advance(&self, consumed: usize) -> Result<()> {
        self.advance_to(consumed, consumed)
    }

    /// Make the pending (or next) read return with `is_canceled` set.
    pub fn cancel_pending_read(&self) {
        self.shared.lock().read_canceled = true;
        self.shared.reader_wake.notify_one();
    }

    /// Complete the consumer side. Safe to call repeatedly.
    pub fn complete(&self) {
        self.shared.complete_reader();
    }

    /// Adapt the reader into a stream of chunks.
    ///
    /// The stream ends when the writer completes or a read is cancelled.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(Some(self), |reader| async move {
            let reader = reader?;
            loop {
                let result = match reader.read().await {
                    Ok(result) => result,
                    Err(e) => return Some((Err(io::Error::other(e)), None)),
                };

                let len = result.buffer.len();
                if len > 0 {
                    let chunk = result.buffer.to_bytes();
                    return match reader.advance(len) {
                        Ok(()) => Some((Ok(chunk), Some(reader))),
                        Err(e) => Some((Err(io::Error::other(e)), None)),
                    };
                }
                if result.is_completed || result.is_canceled {
                    return None;
                }
            }
        })
    }

    /// Adapt the reader into an [`AsyncRead`].
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin + 'static {
        StreamReader::new(Box::pin(self.into_stream()))
    }
}
