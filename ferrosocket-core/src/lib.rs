pub mod connection;
pub mod duplex;
pub mod pipe;

// Re-export specific items for convenience
pub use connection::{
    CloseStatus, Connection, ConnectionState, MemoryConnection, MessageKind, ReceiveResult,
    WebSocketConnection,
};
pub use duplex::{DuplexSocket, Output};
pub use pipe::{FlushResult, Pipe, PipeReader, PipeWriter, ReadBuffer, ReadResult};
