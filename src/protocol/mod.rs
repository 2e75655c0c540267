//! Client-server communication protocol.
//!
//! This module holds everything between a listening socket and the command
//! registry: the wire framing, request and response documents, the worker
//! pool and the accept loop.
//!
//! # Overview
//!
//! A client opens a connection (TCP or Unix domain socket), sends exactly one
//! framed request and waits. The server reads the frame on a pool worker,
//! validates and dispatches the request, writes one response and closes the
//! connection. There is no keep-alive and no pipelining.
//!
//! # Key Components
//!
//! - [`Server`]: binds the configured endpoint and runs the accept loop.
//! - [`ThreadPool`]: fixed set of workers draining a FIFO of connections.
//! - [`ProtocolTransport`]: reads requests and writes responses over a stream.
//! - [`Request`] / [`Response`]: the documents exchanged.
//!
//! # Wire Format
//!
//! - A request is a frame: a big-endian `u32` length followed by that many
//!   bytes of UTF-8 JSON. The length must be within `1..=1024`
//!   ([`MAX_FRAME_LEN`]); anything else is rejected before the payload is read.
//! - The payload is a JSON object with a string `cmd` field plus the fields
//!   that command requires, e.g. `{"cmd":"START","input":"a","output":"b"}`.
//! - The response is a bare JSON object, `{"result":"OK"}` or
//!   `{"result":"FAIL"}`, terminated by the server closing the connection.
//!
//! # See Also
//!
//! - [`command`](crate::command): validation and dispatch of decoded requests.
mod listener;
mod request;
mod response;
mod server;
mod thread;
mod transport;

pub use listener::{Connection, Listener};
pub use request::{Request, RequestError};
pub use response::Response;
pub use server::{Server, ServerError, ShutdownHandle, handle_connection};
pub use thread::{DEFAULT_WORKERS, PoolError, ThreadPool};
pub use transport::{
    FrameError, MAX_FRAME_LEN, ProtocolTransport, TransportError, read_frame, write_frame,
};
