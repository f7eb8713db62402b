//! Caller address resolution, with optional trust of one forwarding header.

use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::config::Settings;

/// Separator proxies use when appending to a forwarding header.
const HOP_SEPARATOR: &str = ", ";

/// Returns the caller's address as a string.
///
/// Without proxy trust this is the peer's IP. With proxy trust it is the
/// last hop of the configured header, i.e. the address the nearest proxy
/// received from. An absent or empty header yields an empty string.
pub fn resolve_client_addr(settings: &Settings, peer: SocketAddr, headers: &HeaderMap) -> String {
    if !settings.proxy {
        return peer.ip().to_string();
    }

    let header_val = headers
        .get(settings.proxy_header.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    header_val
        .rsplit(HOP_SEPARATOR)
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn settings(proxy: bool, header: &str) -> Settings {
        Settings {
            proxy,
            proxy_header: header.to_string(),
            ..Settings::default()
        }
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 55555))
    }

    fn headers(name: &str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_static(value),
        );
        headers
    }

    #[test]
    fn resolves_client_addr() {
        let cases = [
            (false, "X-Forwarded-For", "10.9.9.9", "127.0.0.1"),
            (true, "X-Forwarded-For", "10.0.0.1", "10.0.0.1"),
            (true, "X-Real-Ip", "10.0.0.1", "10.0.0.1"),
            (true, "X-Forwarded-For", "10.0.0.1, 172.16.0.1", "172.16.0.1"),
        ];

        for (proxy, header, value, expected) in cases {
            let resolved = resolve_client_addr(
                &settings(proxy, header),
                peer(),
                &headers(header, value),
            );
            assert_eq!(resolved, expected, "{header}: {value}");
        }
    }

    #[test]
    fn missing_header_is_unresolved() {
        let resolved = resolve_client_addr(
            &settings(true, "X-Forwarded-For"),
            peer(),
            &HeaderMap::new(),
        );
        assert_eq!(resolved, "");
    }

    #[test]
    fn ipv6_peer_has_no_port() {
        let peer: SocketAddr = "[::1]:8080".parse().unwrap();
        let resolved = resolve_client_addr(&settings(false, ""), peer, &HeaderMap::new());
        assert_eq!(resolved, "::1");
    }
}
