//! Inbound pump: connection fragments into the inbound pipe

use super::Inner;
use crate::connection::{Connection, ConnectionState, MessageKind};
use crate::pipe::PipeWriter;
use ferrosocket_common::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

impl<C> Inner<C>
where
    C: Connection + ?Sized,
{
    pub(super) async fn run_inbound(&self, cancel: &CancellationToken) -> Result<()> {
        let mut writer = self.inbound.writer();
        let outcome = self.pump_inbound(&mut writer, cancel).await;
        let result = self.classify("Inbound", outcome);

        // Pass through whatever close status the peer sent us.
        self.complete(
            self.connection.close_status(),
            self.connection.close_status_description(),
        )
        .await;
        result
    }

    /// Receive fragments and publish each logical message once its final
    /// fragment has arrived. Earlier fragments are committed to the pipe as
    /// they arrive but only become readable on the final flush.
    async fn pump_inbound(&self, writer: &mut PipeWriter, cancel: &CancellationToken) -> Result<()> {
        let segment_size = self.options.receive_segment_size;

        loop {
            if cancel.is_cancelled() || self.connection.state() != ConnectionState::Open {
                return Ok(());
            }

            let memory = writer.get_memory(segment_size)?;
            let mut result = self.connection.receive(memory, cancel).await?;

            while !result.end_of_message && result.kind != MessageKind::Close {
                if result.count == 0 {
                    warn!(
                        socket = %self.id,
                        "Empty fragment with more data expected, stopping inbound pump"
                    );
                    return Ok(());
                }
                writer.advance(result.count)?;

                let memory = writer.get_memory(segment_size)?;
                result = self.connection.receive(memory, cancel).await?;
            }

            if result.kind == MessageKind::Close {
                debug!(socket = %self.id, "Peer sent close frame");
                return Ok(());
            }

            writer.advance(result.count)?;

            #[cfg(feature = "metrics")]
            if let Some(m) = ferrosocket_observability::socket_metrics() {
                m.record_message_received(writer.unflushed_len());
            }

            let flush = writer.flush().await?;

            if flush.is_completed {
                debug!(socket = %self.id, "Inbound reader completed");
                return Ok(());
            }
        }
    }
}
