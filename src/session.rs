//! The per-connection echo loop.
//!
//! A [`Session`] owns the upgraded stream for its whole life. Each [`Session::step`]
//! reads exactly one frame and reacts to it before anything else is read, so replies
//! go out in arrival order.
//!
//! ```text
//!   Open --text--> echo, Open
//!   Open --ping/pong/binary/continuation/reserved--> Open
//!   Open --close--> send 0x88 0x00, Closed(PeerClosed)
//!   Open --end of stream / short read--> Closed(EndOfStream)
//!   Open --reset--> Closed(Aborted)
//! ```
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::{codec::Codec, Frame, Message, Options, Result, WebSocketError};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame and was answered with one.
    PeerClosed,
    /// The stream ended, possibly in the middle of a frame.
    EndOfStream,
    /// The peer reset the connection.
    Aborted,
    /// A protocol or I/O error ended the session; [`Session::step`] returned it.
    Failed,
}

/// Where a session is in its lifecycle. The handshake has already happened by the time
/// a `Session` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    Closed(CloseReason),
}

/// Echo loop over an upgraded stream.
pub struct Session<S> {
    framed: Framed<S, Codec>,
    state: State,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a session with default [`Options`].
    pub fn new(stream: S) -> Self {
        Self::with_options(stream, &Options::default())
    }

    /// Starts a session on a stream that has just completed the handshake.
    pub fn with_options(stream: S, options: &Options) -> Self {
        Self {
            framed: Framed::new(stream, Codec::new(options.max_payload_read())),
            state: State::Open,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Reads one frame and handles it.
    ///
    /// Once the session is closed this returns the closed state without touching the
    /// stream. A reset peer is not an error: it moves the session to
    /// `Closed(CloseReason::Aborted)`.
    ///
    /// # Errors
    /// Oversized frames and non-reset I/O failures are returned, and leave the session
    /// in `Closed(CloseReason::Failed)`.
    pub async fn step(&mut self) -> Result<State> {
        if let State::Closed(_) = self.state {
            return Ok(self.state);
        }

        self.state = match self.advance().await {
            Ok(state) => state,
            Err(WebSocketError::ConnectionAborted) => {
                #[cfg(feature = "logging")]
                log::debug!("peer aborted the connection");
                State::Closed(CloseReason::Aborted)
            }
            Err(err) => {
                self.state = State::Closed(CloseReason::Failed);
                return Err(err);
            }
        };

        Ok(self.state)
    }

    /// Runs the loop until the session closes.
    pub async fn run(mut self) -> Result<CloseReason> {
        loop {
            if let State::Closed(reason) = self.step().await? {
                return Ok(reason);
            }
        }
    }

    /// Gives back the underlying stream.
    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }

    async fn advance(&mut self) -> Result<State> {
        let message = match self.framed.next().await {
            Some(message) => message?,
            None => return Ok(State::Closed(CloseReason::EndOfStream)),
        };

        match message {
            Message::Text(payload) => {
                #[cfg(feature = "logging")]
                log::info!("received: {}", String::from_utf8_lossy(&payload));
                self.framed.send(Frame::text(&payload[..])).await?;
                Ok(State::Open)
            }
            Message::Close => {
                #[cfg(feature = "logging")]
                log::debug!("close frame received, replying");
                self.framed.send(Frame::close()).await?;
                Ok(State::Closed(CloseReason::PeerClosed))
            }
            Message::Ignored(_opcode) => {
                #[cfg(feature = "logging")]
                log::debug!(
                    "ignoring {:?} {} frame",
                    _opcode,
                    if _opcode.is_control() { "control" } else { "data" }
                );
                Ok(State::Open)
            }
        }
    }
}
