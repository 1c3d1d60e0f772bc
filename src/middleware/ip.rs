//! Client IP derivation for rate-limit keys.
//!
//! # Header Priority
//!
//! 1. `X-Forwarded-For` (first entry of the comma-separated chain)
//! 2. `X-Real-IP`
//! 3. [`LOOPBACK_IP`]
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **These headers are client-controllable.** The gate is expected to run
//! behind a hosting edge (load balancer or CDN) that overwrites
//! `X-Forwarded-For`. Deployed directly on the internet, a client can rotate
//! spoofed addresses and bypass per-IP rate limiting.
//!
//! All requests without either header share the loopback key, so they are
//! rate limited collectively.

use std::borrow::Cow;

use axum::http::HeaderMap;

/// Fallback client address when no forwarding header is present.
pub const LOOPBACK_IP: &str = "127.0.0.1";

/// Where the client IP was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

#[inline]
fn extract_ip_from_headers(headers: &HeaderMap) -> ExtractedIp<'_> {
    // Format: "client, proxy1, proxy2" - we want the first (client) IP
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        return ExtractedIp::FromXff(first_ip.trim());
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Derive the client IP from request headers.
///
/// Returns `Cow::Borrowed` for the loopback fallback (no allocation) and
/// `Cow::Owned` for addresses read from headers. Use `.into_owned()` when the
/// value must outlive the request.
///
/// # Example
///
/// ```ignore
/// let ip = extract_client_ip(req.headers()).into_owned();
/// let key = format!("ratelimit_middleware_{ip}");
/// ```
#[inline]
pub fn extract_client_ip(headers: &HeaderMap) -> Cow<'static, str> {
    match extract_ip_from_headers(headers) {
        ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => Cow::Owned(ip.to_string()),
        ExtractedIp::NotFound => Cow::Borrowed(LOOPBACK_IP),
    }
}
