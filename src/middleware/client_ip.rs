use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::config::CONFIG;

/// Best-known address of the caller. Proxy headers win over the socket peer
/// only when `TRUST_PROXY_HEADERS` is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let trust_proxy = CONFIG.get().is_some_and(|c| c.trust_proxy_headers);
        Ok(ClientIp(resolve_client_ip(&parts.headers, peer, trust_proxy)))
    }
}

pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if !trust_proxy {
        return peer;
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    forwarded.or_else(real_ip).or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(
            resolve_client_ip(&headers, None, true),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(
            resolve_client_ip(&headers, None, true),
            Some("198.51.100.4".parse().unwrap())
        );

        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(peer), true), Some(peer));
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None, true), None);
    }

    #[test]
    fn untrusted_proxy_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        let peer: IpAddr = "192.0.2.10".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, Some(peer), false), Some(peer));
        assert_eq!(resolve_client_ip(&headers, None, false), None);
    }
}
