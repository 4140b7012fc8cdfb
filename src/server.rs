//! The acceptor: listens for TCP connections and gives each one its own task.
//!
//! A connection starts as HTTP/1 served by hyper. Requests are classified by
//! [`handshake::negotiate`]; an accepted upgrade hands the raw stream to a [`Session`]
//! once the `101` response has been written.
use std::convert::Infallible;

use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::{
    handshake::{self, HttpResponse, Negotiation},
    Result, Session,
};

/// The address the server binds to: port 8080 on every interface.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Per-connection configuration.
///
/// ```rust
/// use wsecho::Options;
///
/// let options = Options::default().with_max_payload_read(16 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Maximum payload size accepted in a single frame. `None` leaves it bounded only by
    /// memory.
    max_payload_read: Option<usize>,
}

impl Options {
    /// Sets the maximum allowed payload size for incoming frames.
    ///
    /// A frame declaring a longer payload ends its connection with
    /// [`WebSocketError::FrameTooLarge`](crate::WebSocketError::FrameTooLarge) before
    /// any of the payload is buffered.
    pub fn with_max_payload_read(self, size: usize) -> Self {
        Self {
            max_payload_read: Some(size),
        }
    }

    pub(crate) fn max_payload_read(&self) -> usize {
        self.max_payload_read.unwrap_or(usize::MAX)
    }
}

/// Accepts connections forever.
///
/// Failures are scoped to the connection they happen on; a failed `accept` is logged
/// and the loop carries on.
pub async fn serve(listener: TcpListener, options: Options) {
    #[cfg(feature = "logging")]
    if let Ok(addr) = listener.local_addr() {
        log::info!("serving at {}", addr);
    }

    loop {
        let (stream, _peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_err) => {
                #[cfg(feature = "logging")]
                log::error!("accept failed: {}", _err);
                continue;
            }
        };

        #[cfg(feature = "logging")]
        log::info!("client connected: {}", _peer);

        let options = options.clone();
        tokio::spawn(async move {
            if let Err(_err) = serve_connection(stream, options).await {
                #[cfg(feature = "logging")]
                log::error!("connection {} failed: {}", _peer, _err);
            }
        });
    }
}

/// Serves HTTP/1 on `stream` until it closes or is upgraded.
pub async fn serve_connection(stream: TcpStream, options: Options) -> Result<()> {
    let io = TokioIo::new(stream);
    http1::Builder::new()
        .serve_connection(
            io,
            service_fn(move |req| handle_request(req, options.clone())),
        )
        .with_upgrades()
        .await?;

    Ok(())
}

async fn handle_request(
    mut req: Request<Incoming>,
    options: Options,
) -> std::result::Result<HttpResponse, Infallible> {
    let negotiation = match handshake::negotiate(&req) {
        Ok(negotiation) => negotiation,
        Err(_err) => {
            #[cfg(feature = "logging")]
            log::warn!("{}, serving the plain page instead", _err);
            Negotiation::Plain
        }
    };

    if let Negotiation::Upgrade { .. } = negotiation {
        let on_upgrade = hyper::upgrade::on(&mut req);
        tokio::spawn(async move {
            let upgraded = match on_upgrade.await {
                Ok(upgraded) => upgraded,
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    log::error!("upgrading connection: {}", _err);
                    return;
                }
            };

            let session = Session::with_options(TokioIo::new(upgraded), &options);
            match session.run().await {
                Ok(_reason) => {
                    #[cfg(feature = "logging")]
                    log::debug!("websocket closed: {:?}", _reason);
                }
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    log::error!("websocket failed: {}", _err);
                }
            }
        });
    }

    Ok(negotiation.into_response())
}
