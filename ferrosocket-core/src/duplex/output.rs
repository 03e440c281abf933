use super::Inner;
use crate::connection::{Connection, MessageKind};
use crate::pipe::{FlushResult, PipeWriter};
use async_trait::async_trait;
use ferrosocket_common::{Result, SocketError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// Producer side of a duplex socket's outbound path.
///
/// In pump mode writes go into the outbound pipe and the outbound pump turns
/// them into frames. In pass-through mode every write is sent straight away
/// as one complete binary message.
#[derive(Clone)]
pub struct Output {
    sink: Sink,
}

#[derive(Clone)]
enum Sink {
    Buffered(Arc<Mutex<PipeWriter>>),
    Direct(Arc<dyn MessageSink>),
}

#[async_trait]
trait MessageSink: Send + Sync {
    async fn send_message(&self, data: &[u8]) -> Result<()>;
    async fn finish(&self);
}

#[async_trait]
impl<C> MessageSink for Inner<C>
where
    C: Connection + ?Sized + 'static,
{
    async fn send_message(&self, data: &[u8]) -> Result<()> {
        if self.completed.load(Ordering::Acquire) {
            return Err(SocketError::InvalidState(
                "cannot write after the socket completed".into(),
            ));
        }
        trace!(socket = %self.id, len = data.len(), "Sending message");
        self.connection
            .send(data, MessageKind::Binary, true, &self.shutdown)
            .await?;

        #[cfg(feature = "metrics")]
        if let Some(m) = ferrosocket_observability::socket_metrics() {
            m.record_frames_sent(1, data.len());
        }
        Ok(())
    }

    async fn finish(&self) {
        self.complete(None, None).await;
    }
}

impl Output {
    pub(super) fn buffered(writer: Arc<Mutex<PipeWriter>>) -> Self {
        Self {
            sink: Sink::Buffered(writer),
        }
    }

    pub(super) fn direct<C>(inner: Arc<Inner<C>>) -> Self
    where
        C: Connection + ?Sized + 'static,
    {
        Self {
            sink: Sink::Direct(inner),
        }
    }

    /// Write `data` to the outbound path.
    ///
    /// Pump mode applies the outbound pipe's backpressure. Pass-through mode
    /// returns once the message has been handed to the connection.
    pub async fn write(&self, data: &[u8]) -> Result<FlushResult> {
        match &self.sink {
            Sink::Buffered(writer) => writer.lock().await.write(data).await,
            Sink::Direct(sink) => {
                sink.send_message(data).await?;
                Ok(FlushResult::default())
            }
        }
    }

    /// Publish anything staged in the outbound pipe. No-op in pass-through mode.
    pub async fn flush(&self) -> Result<FlushResult> {
        match &self.sink {
            Sink::Buffered(writer) => writer.lock().await.flush().await,
            Sink::Direct(_) => Ok(FlushResult::default()),
        }
    }

    /// Signal that no more data will be written.
    ///
    /// In pump mode the outbound pump drains what is buffered and then
    /// completes the socket. In pass-through mode the socket completes now.
    pub async fn complete(&self) {
        match &self.sink {
            Sink::Buffered(writer) => writer.lock().await.complete(),
            Sink::Direct(sink) => sink.finish().await,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.sink, Sink::Direct(_))
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("pass_through", &self.is_pass_through())
            .finish()
    }
}
