//! Protocol classification.
//!
//! The policy applies to plain HTTP exchanges only. A WebSocket handshake
//! arrives on the same service as an HTTP/1.1 request carrying
//! `Connection: upgrade` and `Upgrade: websocket`; once accepted it is no
//! longer an HTTP exchange, so it is passed through untouched.

use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::{HeaderMap, HeaderName, Request};

/// Protocol a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolClass {
    Http,
    WebSocket,
}

/// Classify a request by protocol.
pub fn classify<B>(req: &Request<B>) -> ProtocolClass {
    let headers = req.headers();
    if has_token(headers, &CONNECTION, "upgrade") && has_token(headers, &UPGRADE, "websocket") {
        ProtocolClass::WebSocket
    } else {
        ProtocolClass::Http
    }
}

/// Whether any comma-separated element of header `name` equals `token`,
/// ignoring ASCII case.
fn has_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|element| element.trim().eq_ignore_ascii_case(token))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_request_is_http() {
        let req = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(classify(&req), ProtocolClass::Http);
    }

    #[test]
    fn test_websocket_upgrade() {
        let req = Request::builder()
            .uri("/ws")
            .header("connection", "keep-alive, Upgrade")
            .header("upgrade", "WebSocket")
            .body(())
            .unwrap();
        assert_eq!(classify(&req), ProtocolClass::WebSocket);
    }

    #[test]
    fn test_upgrade_without_connection_token() {
        let req = Request::builder()
            .uri("/ws")
            .header("upgrade", "websocket")
            .body(())
            .unwrap();
        assert_eq!(classify(&req), ProtocolClass::Http);
    }

    #[test]
    fn test_other_upgrade_is_http() {
        let req = Request::builder()
            .uri("/")
            .header("connection", "upgrade")
            .header("upgrade", "h2c")
            .body(())
            .unwrap();
        assert_eq!(classify(&req), ProtocolClass::Http);
    }
}
