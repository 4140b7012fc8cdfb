//! # wsecho
//! A minimal WebSocket (RFC 6455) echo server: it answers the HTTP upgrade handshake,
//! decodes frames off the upgraded stream and sends every text message straight back.
//!
//! The crate is split along the protocol's seams:
//!
//! - [`handshake`]: classifies HTTP requests and computes the `Sec-WebSocket-Accept` token.
//! - [`frame`] and [`codec`]: the byte-exact framing layer, as `tokio_util` codecs.
//! - [`session`]: the per-connection echo loop and its explicit state.
//! - [`server`]: the TCP acceptor, one task per connection, HTTP/1 via hyper.
//!
//! # Features
//!
//! - `logging` (default): connection and frame events through the `log` crate. The
//!   `wsecho` binary requires it.
//!
//! # Server Example
//! ```no_run
//! use tokio::net::TcpListener;
//! use wsecho::{server, Options};
//!
//! #[tokio::main]
//! async fn main() -> wsecho::Result<()> {
//!     let listener = TcpListener::bind(server::DEFAULT_ADDR).await?;
//!     server::serve(listener, Options::default()).await;
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//! - Fragmented messages are not reassembled: each text fragment is echoed on its own.
//! - Ping, pong, binary and continuation frames are read and dropped.
//! - There are no timeouts; a silent peer holds its task until the socket goes away.

pub mod codec;
pub mod frame;
pub mod handshake;
mod mask;
pub mod server;
pub mod session;

use std::io;

use thiserror::Error;

pub use frame::{Frame, Message, OpCode};
pub use handshake::{HttpResponse, Negotiation};
pub use server::Options;
pub use session::{CloseReason, Session, State};

/// A result type for WebSocket operations, using `WebSocketError` as the error type.
pub type Result<T> = std::result::Result<T, WebSocketError>;

/// Represents errors that can occur while serving a connection.
///
/// None of these outlive the connection they happened on: the acceptor logs them and
/// moves on.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// An upgrade request arrived without a usable `Sec-WebSocket-Key` header.
    #[error("Sec-WebSocket-Key header is missing")]
    MissingSecWebSocketKey,

    /// A frame declared a payload larger than the configured limit, or larger than
    /// this platform can address.
    #[error("Frame too large")]
    FrameTooLarge,

    /// The peer reset or aborted the stream during a read or a write.
    #[error("Connection aborted by peer")]
    ConnectionAborted,

    /// Any other I/O failure on the underlying stream.
    #[error(transparent)]
    IoError(io::Error),

    /// Wraps errors from hyper while serving the HTTP side of a connection.
    #[error(transparent)]
    HTTPError(#[from] hyper::Error),
}

impl From<io::Error> for WebSocketError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => WebSocketError::ConnectionAborted,
            _ => WebSocketError::IoError(err),
        }
    }
}
