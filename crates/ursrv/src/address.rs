// Submitter address resolution
//
// The payload's own address field is never trusted; the server derives it
// from the request instead.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the submitter address for a request.
///
/// Prefers the first `X-Forwarded-For` entry over the connection address,
/// strips any port, and yields an empty string if what remains is not an IP.
pub fn resolve_submitter_address(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    match forwarded {
        Some(value) => resolve_address(value.split(',').next().unwrap_or_default()),
        None => remote.map(|addr| addr.ip().to_string()).unwrap_or_default(),
    }
}

/// Parse `host` or `host:port` into a bare IP string, or empty if invalid.
pub fn resolve_address(raw: &str) -> String {
    let raw = raw.trim();

    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    raw.parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}
