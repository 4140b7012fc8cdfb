//! HTTP side of the connection: deciding whether a request upgrades, computing the
//! `Sec-WebSocket-Accept` token and building the responses.
//!
//! ```rust
//! use wsecho::handshake::accept_key;
//!
//! assert_eq!(
//!     accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="),
//!     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
//! );
//! ```
use base64::prelude::*;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, HeaderMap, Method, Request, Response, StatusCode, Version};
use sha1::{Digest, Sha1};

use crate::{Result, WebSocketError};

/// Type alias for every response the server writes before (or instead of) upgrading.
pub type HttpResponse = Response<Full<Bytes>>;

/// Body served to clients that do not ask for a WebSocket.
pub const PLAIN_PAGE: &str = "This is a simple HTTP server, use a WebSocket client to connect.\n";

/// Appended to the client key before hashing, RFC 6455 section 1.3.
const WEBSOCKET_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes `base64(SHA1(key + GUID))`.
pub fn accept_key(key: &[u8]) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key);
    sha1.update(WEBSOCKET_GUID);
    let result = sha1.finalize();
    BASE64_STANDARD.encode(&result[..])
}

/// What the server does with an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// Switch protocols. Carries the computed `Sec-WebSocket-Accept` value.
    Upgrade { accept: String },
    /// Serve [`PLAIN_PAGE`].
    Plain,
    /// The method is not GET.
    NotImplemented,
}

impl Negotiation {
    /// Builds the response to send for this outcome.
    pub fn into_response(self) -> HttpResponse {
        match self {
            Negotiation::Upgrade { accept } => switching_protocols(&accept),
            Negotiation::Plain => plain_page(),
            Negotiation::NotImplemented => not_implemented(),
        }
    }
}

/// Classifies `request`.
///
/// # Errors
/// Returns [`WebSocketError::MissingSecWebSocketKey`] when the request asks for a
/// WebSocket upgrade but carries no (or an empty) `Sec-WebSocket-Key`. The caller decides
/// what to answer in that case.
///
/// Requests older than HTTP/1.1 cannot be upgraded and are always [`Negotiation::Plain`].
pub fn negotiate<B>(request: &Request<B>) -> Result<Negotiation> {
    if *request.method() != Method::GET {
        return Ok(Negotiation::NotImplemented);
    }

    let headers = request.headers();
    if request.version() < Version::HTTP_11 || !wants_websocket(headers) {
        return Ok(Negotiation::Plain);
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .filter(|key| !key.is_empty())
        .ok_or(WebSocketError::MissingSecWebSocketKey)?;

    Ok(Negotiation::Upgrade {
        accept: accept_key(key.as_bytes()),
    })
}

fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// `101 Switching Protocols` with the upgrade headers and the accept token.
pub fn switching_protocols(accept: &str) -> HttpResponse {
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .header(header::SEC_WEBSOCKET_ACCEPT, accept)
        .body(Full::default())
        .expect("bug: failed to build response")
}

/// `200 OK` with the plain HTML page.
pub fn plain_page() -> HttpResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html")
        .body(Full::new(Bytes::from_static(PLAIN_PAGE.as_bytes())))
        .expect("bug: failed to build response")
}

/// `501 Not Implemented`, for any method other than GET.
pub fn not_implemented() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NOT_IMPLEMENTED)
        .body(Full::default())
        .expect("bug: failed to build response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn request(method: Method, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().method(method).uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_accept_key_rfc_vector() {
        assert_eq!(
            accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_accept_key_deterministic() {
        let key = b"x3JJHMbDL1EzLkh9GBhXDw==";
        assert_eq!(accept_key(key), accept_key(key));
        assert_ne!(accept_key(key), accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="));
        // second known key/accept pair
        assert_eq!(accept_key(key), "HSmrc0sMlYUkAGmm5OPpG2HaGWk=");
    }

    #[test]
    fn test_negotiate_upgrade() {
        let req = request(
            Method::GET,
            &[
                ("Upgrade", "websocket"),
                ("Connection", "Upgrade"),
                ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ],
        );
        assert_eq!(
            negotiate(&req).unwrap(),
            Negotiation::Upgrade {
                accept: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".to_string()
            }
        );
    }

    #[test]
    fn test_negotiate_upgrade_case_insensitive() {
        let req = request(
            Method::GET,
            &[("upgrade", "WebSocket"), ("sec-websocket-key", "abc")],
        );
        assert!(matches!(
            negotiate(&req).unwrap(),
            Negotiation::Upgrade { .. }
        ));
    }

    #[test]
    fn test_negotiate_plain() {
        let req = request(Method::GET, &[]);
        assert_eq!(negotiate(&req).unwrap(), Negotiation::Plain);

        let req = request(Method::GET, &[("Upgrade", "h2c")]);
        assert_eq!(negotiate(&req).unwrap(), Negotiation::Plain);

        // a key alone does not make an upgrade
        let req = request(Method::GET, &[("Sec-WebSocket-Key", "abc")]);
        assert_eq!(negotiate(&req).unwrap(), Negotiation::Plain);
    }

    #[test]
    fn test_negotiate_missing_key() {
        let req = request(Method::GET, &[("Upgrade", "websocket")]);
        assert!(matches!(
            negotiate(&req),
            Err(WebSocketError::MissingSecWebSocketKey)
        ));

        let req = request(
            Method::GET,
            &[("Upgrade", "websocket"), ("Sec-WebSocket-Key", "")],
        );
        assert!(matches!(
            negotiate(&req),
            Err(WebSocketError::MissingSecWebSocketKey)
        ));
    }

    #[test]
    fn test_negotiate_http10_stays_plain() {
        let req = Request::builder()
            .method(Method::GET)
            .version(Version::HTTP_10)
            .uri("/")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(())
            .unwrap();
        assert_eq!(negotiate(&req).unwrap(), Negotiation::Plain);
    }

    #[test]
    fn test_negotiate_not_get() {
        let req = request(Method::POST, &[("Upgrade", "websocket")]);
        assert_eq!(negotiate(&req).unwrap(), Negotiation::NotImplemented);
    }

    #[test]
    fn test_switching_protocols_headers() {
        let response = switching_protocols("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

        let headers = response.headers();
        assert_eq!(headers[header::UPGRADE], "websocket");
        assert_eq!(headers[header::CONNECTION], "Upgrade");
        assert_eq!(
            headers[header::SEC_WEBSOCKET_ACCEPT],
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[tokio::test]
    async fn test_plain_page() {
        let response = Negotiation::Plain.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, PLAIN_PAGE.as_bytes());
    }

    #[test]
    fn test_not_implemented() {
        let response = Negotiation::NotImplemented.into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
