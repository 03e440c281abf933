//! Outbound pump: outbound pipe segments into connection fragments

use super::Inner;
use crate::connection::{Connection, MessageKind};
use crate::pipe::PipeReader;
use ferrosocket_common::{Result, SocketError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl<C> Inner<C>
where
    C: Connection + ?Sized,
{
    pub(super) async fn run_outbound(
        &self,
        reader: PipeReader,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let outcome = self.pump_outbound(&reader, cancel).await;
        reader.complete();
        let result = self.classify("Outbound", outcome);

        self.complete(None, None).await;
        result
    }

    /// Send each read as one logical message: every segment becomes a
    /// fragment and only the last one carries end-of-message.
    async fn pump_outbound(&self, reader: &PipeReader, cancel: &CancellationToken) -> Result<()> {
        loop {
            let result = tokio::select! {
                result = reader.read() => result?,
                () = cancel.cancelled() => return Err(SocketError::Cancelled),
            };

            let buffer = &result.buffer;
            if !buffer.is_empty() {
                let last = buffer.segments().len() - 1;
                for (index, segment) in buffer.segments().enumerate() {
                    self.connection
                        .send(segment, MessageKind::Binary, index == last, cancel)
                        .await?;
                }

                #[cfg(feature = "metrics")]
                if let Some(m) = ferrosocket_observability::socket_metrics() {
                    m.record_frames_sent(last + 1, buffer.len());
                }
            }
            reader.advance(buffer.len())?;

            if result.is_completed {
                debug!(socket = %self.id, "Outbound writer completed");
                return Ok(());
            }
            if result.is_canceled {
                debug!(socket = %self.id, "Outbound read cancelled");
                return Ok(());
            }
        }
    }
}
