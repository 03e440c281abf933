use bytes::{Bytes, BytesMut};

/// Segmented view of the bytes available to a reader
#[derive(Debug, Clone, Default)]
pub struct ReadBuffer {
    segments: Vec<Bytes>,
    len: usize,
}

impl ReadBuffer {
    pub(crate) fn new(segments: Vec<Bytes>, len: usize) -> Self {
        Self { segments, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Segments in publish order
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &Bytes> + '_ {
        self.segments.iter()
    }

    /// Contiguous copy of the buffer. Free when there is a single segment.
    pub fn to_bytes(&self) -> Bytes {
        match self.segments.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            many => {
                let mut joined = BytesMut::with_capacity(self.len);
                for segment in many {
                    joined.extend_from_slice(segment);
                }
                joined.freeze()
            }
        }
    }
}

/// Outcome of [`PipeReader::read`](super::PipeReader::read)
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub buffer: ReadBuffer,
    /// The writer completed; no more data will arrive after `buffer`
    pub is_completed: bool,
    /// The read was cancelled with `cancel_pending_read`
    pub is_canceled: bool,
}

/// Outcome of [`PipeWriter::flush`](super::PipeWriter::flush)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushResult {
    /// The reader completed and has no further interest in data
    pub is_completed: bool,
    /// The flush was cancelled with `cancel_pending_flush`
    pub is_canceled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bytes_joins_segments() {
        let buffer = ReadBuffer::new(vec![Bytes::from("he"), Bytes::from("llo")], 5);
        assert_eq!(&buffer.to_bytes()[..], b"hello");
        assert_eq!(buffer.segments().len(), 2);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = ReadBuffer::default();
        assert!(buffer.is_empty());
        assert!(buffer.to_bytes().is_empty());
    }
}
