use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

const FALLBACK_ADDRESS: &str = "127.0.0.1";

/// Caller address used as the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

fn forwarded_address(headers: &HeaderMap) -> Option<&str> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded.or(real_ip)
}

/// The socket peer, unless `trust_headers` is set, in which case the first
/// hop of `x-forwarded-for` and then `x-real-ip` take precedence.
pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trust_headers: bool) -> String {
    let from_headers = trust_headers.then(|| forwarded_address(headers)).flatten();

    from_headers
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddress(resolve(&parts.headers, peer, state.trust_proxy_headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn spoofed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn forwarding_headers_are_ignored_unless_trusted() {
        let peer: IpAddr = "192.0.2.10".parse().unwrap();
        assert_eq!(resolve(&spoofed_headers(), Some(peer), false), "192.0.2.10");
        assert_eq!(resolve(&spoofed_headers(), None, false), FALLBACK_ADDRESS);
    }

    #[test]
    fn trusted_forwarded_for_wins_and_takes_first_hop() {
        let peer: IpAddr = "192.0.2.10".parse().unwrap();
        assert_eq!(resolve(&spoofed_headers(), Some(peer), true), "203.0.113.7");
    }

    #[test]
    fn trusted_lookup_falls_back_through_real_ip_and_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(resolve(&headers, None, true), "198.51.100.2");

        let peer: IpAddr = "192.0.2.10".parse().unwrap();
        assert_eq!(resolve(&HeaderMap::new(), Some(peer), true), "192.0.2.10");
        assert_eq!(resolve(&HeaderMap::new(), None, true), FALLBACK_ADDRESS);
    }
}
