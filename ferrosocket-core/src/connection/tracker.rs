//! Close-handshake bookkeeping shared by connection implementations

use super::{CloseStatus, ConnectionState};
use ferrosocket_common::{Result, SocketError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct CloseInfo {
    status: Option<CloseStatus>,
    description: Option<String>,
    from_peer: bool,
}

/// Tracks connection state transitions and the recorded close status.
#[derive(Debug)]
pub(crate) struct StateTracker {
    state: watch::Sender<ConnectionState>,
    close_info: Mutex<CloseInfo>,
    aborted: CancellationToken,
}

impl StateTracker {
    pub(crate) fn new(initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            close_info: Mutex::new(CloseInfo::default()),
            aborted: CancellationToken::new(),
        }
    }

    fn info(&self) -> MutexGuard<'_, CloseInfo> {
        self.close_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn close_status(&self) -> Option<CloseStatus> {
        self.info().status
    }

    pub(crate) fn close_status_description(&self) -> Option<String> {
        self.info().description.clone()
    }

    /// Fires when the connection is disposed
    pub(crate) fn aborted(&self) -> &CancellationToken {
        &self.aborted
    }

    pub(crate) fn ensure_can_receive(&self) -> Result<()> {
        let state = self.state();
        if state.can_receive() {
            Ok(())
        } else {
            Err(SocketError::InvalidState(format!(
                "cannot receive while the connection is {state}"
            )))
        }
    }

    pub(crate) fn ensure_can_send(&self) -> Result<()> {
        let state = self.state();
        if state.can_send() {
            Ok(())
        } else {
            Err(SocketError::InvalidState(format!(
                "cannot send while the connection is {state}"
            )))
        }
    }

    /// Our close frame went out.
    pub(crate) fn on_close_sent(&self, status: CloseStatus, description: &str) {
        {
            let mut info = self.info();
            if !info.from_peer {
                info.status = Some(status);
                info.description = Some(description.to_string());
            }
        }
        self.state.send_if_modified(|state| match *state {
            ConnectionState::Open => {
                *state = ConnectionState::CloseSent;
                true
            }
            ConnectionState::CloseReceived => {
                *state = ConnectionState::Closed;
                true
            }
            _ => false,
        });
    }

    /// The peer's close frame arrived.
    pub(crate) fn on_close_received(&self, status: CloseStatus, description: String) {
        {
            let mut info = self.info();
            info.status = Some(status);
            info.description = Some(description);
            info.from_peer = true;
        }
        self.state.send_if_modified(|state| match *state {
            ConnectionState::Open => {
                *state = ConnectionState::CloseReceived;
                true
            }
            ConnectionState::CloseSent => {
                *state = ConnectionState::Closed;
                true
            }
            _ => false,
        });
    }

    /// The underlying stream ended without further frames.
    pub(crate) fn on_stream_end(&self) {
        self.state.send_if_modified(|state| match *state {
            ConnectionState::CloseSent | ConnectionState::CloseReceived => {
                *state = ConnectionState::Closed;
                true
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                *state = ConnectionState::Aborted;
                true
            }
            ConnectionState::Closed | ConnectionState::Aborted => false,
        });
    }

    pub(crate) fn abort(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed || *state == ConnectionState::Aborted {
                false
            } else {
                *state = ConnectionState::Aborted;
                true
            }
        });
        self.aborted.cancel();
    }

    /// Resolves once the connection is closed or aborted.
    pub(crate) async fn wait_terminal(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }
}
