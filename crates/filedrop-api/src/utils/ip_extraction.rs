//! Client address extraction
//!
//! `X-Forwarded-For` is only believed as far as the configured number of
//! trusted proxies reaches; with none, the socket address is the client.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Extract the client IP, or "unknown" when nothing usable is available.
///
/// With `trusted_proxy_count = N`, the N-th entry from the end of the
/// forwarded chain is the address the outermost trusted proxy saw.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if trusted_proxy_count > 0 {
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| extract_from_forwarded_for(value, trusted_proxy_count))
        {
            return ip;
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if ips.len() < trusted_proxy_count {
        return None;
    }

    let candidate = ips[ips.len() - trusted_proxy_count];
    candidate
        .parse::<IpAddr>()
        .ok()
        .map(|ip| ip.to_string())
}
