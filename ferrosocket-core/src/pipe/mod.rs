//! Flow-controlled byte pipe
//!
//! A unidirectional conduit with a producer side ([`PipeWriter`]) and a
//! consumer side ([`PipeReader`]). Producers stage bytes and publish them
//! with `flush`; consumers read a segmented view of everything published and
//! advance past what they consumed.
//!
//! Both sides can be completed from any holder of the [`Pipe`] handle and
//! completion is idempotent on either side, in any order.

mod buffer;
mod reader;
mod writer;

pub use buffer::{FlushResult, ReadBuffer, ReadResult};
pub use reader::PipeReader;
pub use writer::PipeWriter;

use bytes::Bytes;
use ferrosocket_common::{PipeOptions, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Cheap handle to a pipe's shared state.
#[derive(Clone, Debug)]
pub struct Pipe {
    shared: Arc<Shared>,
}

impl Pipe {
    /// Create a new pipe after validating `options`.
    pub fn new(options: PipeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(options)),
        })
    }

    /// Create an unbounded pipe with default segment sizing
    pub fn unbounded() -> Self {
        Self {
            shared: Arc::new(Shared::new(PipeOptions::unbounded())),
        }
    }

    /// Consumer side. Clones observe the same data.
    pub fn reader(&self) -> PipeReader {
        PipeReader::new(self.shared.clone())
    }

    /// Producer side. Dropping the writer completes it.
    pub fn writer(&self) -> PipeWriter {
        PipeWriter::new(self.shared.clone())
    }

    /// Mark the producer side completed. Safe to call repeatedly.
    pub fn complete_writer(&self) {
        self.shared.complete_writer();
    }

    /// Mark the consumer side completed. Safe to call repeatedly.
    pub fn complete_reader(&self) {
        self.shared.complete_reader();
    }

    pub fn is_writer_completed(&self) -> bool {
        self.shared.lock().writer_completed
    }

    pub fn is_reader_completed(&self) -> bool {
        self.shared.lock().reader_completed
    }

    /// Bytes flushed but not yet consumed
    pub fn unread_len(&self) -> usize {
        self.shared.lock().unread
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<PipeState>,
    reader_wake: Notify,
    writer_wake: Notify,
    options: PipeOptions,
}

#[derive(Debug, Default)]
pub(crate) struct PipeState {
    /// Flushed, unconsumed data in publish order
    segments: VecDeque<Bytes>,
    unread: usize,
    /// Reader has examined everything available; next read waits for more
    examined_all: bool,
    writer_completed: bool,
    reader_completed: bool,
    read_canceled: bool,
    flush_canceled: bool,
}

impl Shared {
    fn new(options: PipeOptions) -> Self {
        Self {
            state: Mutex::new(PipeState::default()),
            reader_wake: Notify::new(),
            writer_wake: Notify::new(),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete_writer(&self) {
        {
            let mut state = self.lock();
            if state.writer_completed {
                return;
            }
            state.writer_completed = true;
        }
        self.reader_wake.notify_one();
    }

    fn complete_reader(&self) {
        {
            let mut state = self.lock();
            if state.reader_completed {
                return;
            }
            state.reader_completed = true;
            state.segments.clear();
            state.unread = 0;
        }
        self.writer_wake.notify_one();
    }
}
