//! IP address extraction utilities
//!
//! Provides extraction of client IP addresses from X-Forwarded-For headers
//! with validation to prevent header spoofing. The result is stored on each
//! form submission and keys the login failure limiter.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::constants::DEFAULT_TRUSTED_PROXY_COUNT;

/// Client IP resolved for the current request ("unknown" when nothing usable was found)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The IP to persist, or `None` when it could not be determined
    pub fn known(&self) -> Option<String> {
        (self.0 != "unknown").then(|| self.0.clone())
    }
}

pub fn trusted_proxy_count() -> usize {
    std::env::var("TRUSTED_PROXY_COUNT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_TRUSTED_PROXY_COUNT)
}

/// Resolve the client IP from request parts (headers, then the socket address)
pub fn client_ip_from_parts(parts: &Parts) -> ClientIp {
    let socket_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    ClientIp(extract_client_ip(
        &parts.headers,
        socket_addr.as_ref(),
        trusted_proxy_count(),
    ))
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(client_ip_from_parts(parts))
    }
}

/// Extract and validate client IP from request headers
///
/// When behind a load balancer or proxy, the X-Forwarded-For header contains a
/// chain of IP addresses. The entry before the last `trusted_proxy_count`
/// entries is the client.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(header_value) = forwarded_for.to_str() {
            if let Some(ip) = extract_from_forwarded_for(header_value, trusted_proxy_count) {
                return ip;
            }
        }
    }

    // X-Real-IP carries a single address set by some proxies
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(header_value) = real_ip.to_str() {
            let trimmed = header_value.trim();
            if is_valid_ip(trimmed) {
                return trimmed.to_string();
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Pick the client entry out of `client, proxy1, proxy2, ...`
///
/// With no trusted proxies the header could be spoofed, so only the last
/// entry (closest to us) is used.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)
    }?;

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_headers_with_xff(xff_value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(xff_value).unwrap());
        headers
    }

    #[test]
    fn test_extract_from_forwarded_for_single_ip() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1", 0).as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1", 1).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn test_extract_from_forwarded_for_with_proxies() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1", 1).as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1, 10.0.0.2", 2).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn test_extract_from_forwarded_for_untrusted_uses_last_hop() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1", 0).as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn test_extract_from_forwarded_for_invalid_ip() {
        assert_eq!(extract_from_forwarded_for("not.an.ip.address", 0), None);
        assert_eq!(extract_from_forwarded_for(" , ", 1), None);
    }

    #[test]
    fn test_extract_client_ip_prefers_header_then_real_ip_then_socket() {
        let headers = create_headers_with_xff("203.0.113.7");
        assert_eq!(extract_client_ip(&headers, None, 0), "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(extract_client_ip(&headers, None, 1), "198.51.100.4");

        let socket = SocketAddr::from(([127, 0, 0, 1], 8080));
        assert_eq!(extract_client_ip(&HeaderMap::new(), Some(&socket), 0), "127.0.0.1");
        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 0), "unknown");
    }

    #[test]
    fn test_client_ip_known() {
        assert_eq!(ClientIp("unknown".into()).known(), None);
        assert_eq!(ClientIp("::1".into()).known().as_deref(), Some("::1"));
    }
}
