//! Security response headers and the Content-Security-Policy.
//!
//! Headers stamped on every response:
//! - `X-DNS-Prefetch-Control: on`
//! - `X-XSS-Protection: 1; mode=block`
//! - `X-Frame-Options: DENY`
//! - `X-Content-Type-Options: nosniff`
//! - `Referrer-Policy: origin-when-cross-origin`
//! - `Permissions-Policy: camera=(self), microphone=(self), geolocation=()`
//! - `Content-Security-Policy` - computed, see [`content_security_policy`]
//!
//! The policy allows the Clerk and Stream.io endpoints the front end talks
//! to. In development it additionally allows Clerk's preview subdomains and
//! Stream.io wildcard subdomains used for local testing.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::RuntimeEnv;
use crate::error::{AppError, AppResult};

/// Headers with fixed values, in the order they are applied.
pub const STATIC_SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-dns-prefetch-control", "on"),
    ("x-xss-protection", "1; mode=block"),
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "origin-when-cross-origin"),
    (
        "permissions-policy",
        "camera=(self), microphone=(self), geolocation=()",
    ),
];

pub const CONTENT_SECURITY_POLICY: &str = "content-security-policy";

const CLERK_PREVIEW: &str = "https://*.clerk.accounts.dev";
const STREAM_WILDCARD_WSS: &str = "wss://*.stream-io-api.com";
const STREAM_WILDCARD_HTTPS: &str = "https://*.stream-io-api.com";

/// Build the policy as (directive, sources) pairs before collapsing it.
fn directives(env: RuntimeEnv) -> Vec<(&'static str, Vec<&'static str>)> {
    let dev = env.is_development();
    let only_dev = |sources: &[&'static str]| -> Vec<&'static str> {
        if dev { sources.to_vec() } else { Vec::new() }
    };

    vec![
        ("default-src", vec!["'self'"]),
        (
            "script-src",
            [
                vec![
                    "'self'",
                    "'unsafe-eval'",
                    "'unsafe-inline'",
                    "https://js.clerk.dev",
                    "https://clerk.nexthub.com",
                ],
                only_dev(&[CLERK_PREVIEW]),
            ]
            .concat(),
        ),
        (
            "style-src",
            vec!["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"],
        ),
        (
            "img-src",
            [
                vec![
                    "'self'",
                    "blob:",
                    "data:",
                    "https://img.clerk.com",
                    "https://images.clerk.dev",
                ],
                only_dev(&[CLERK_PREVIEW]),
            ]
            .concat(),
        ),
        ("font-src", vec!["'self'", "https://fonts.gstatic.com"]),
        ("object-src", vec!["'none'"]),
        ("base-uri", vec!["'self'"]),
        ("form-action", vec!["'self'"]),
        ("frame-ancestors", vec!["'none'"]),
        ("block-all-mixed-content", vec![]),
        ("upgrade-insecure-requests", vec![]),
        (
            "connect-src",
            [
                vec![
                    "'self'",
                    "https://api.clerk.dev",
                    "https://clerk.nexthub.com",
                ],
                only_dev(&[CLERK_PREVIEW]),
                vec!["wss://video.stream-io-api.com", "https://stream-io-api.com"],
                only_dev(&[STREAM_WILDCARD_WSS, STREAM_WILDCARD_HTTPS]),
            ]
            .concat(),
        ),
        (
            "media-src",
            [
                vec!["'self'", "https://stream-io-api.com"],
                only_dev(&[STREAM_WILDCARD_HTTPS]),
            ]
            .concat(),
        ),
    ]
}

/// Render the Content-Security-Policy as a single whitespace-normalised line.
pub fn content_security_policy(env: RuntimeEnv) -> String {
    let rendered = directives(env)
        .into_iter()
        .map(|(name, sources)| {
            if sources.is_empty() {
                format!("{name};")
            } else {
                format!("{name} {};", sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    collapse_whitespace(&rendered)
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Precomputed header set stamped on every gate response.
///
/// The policy depends only on the environment, so header values are parsed
/// once when the gate is built.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn new(env: RuntimeEnv) -> AppResult<Self> {
        let mut headers = STATIC_SECURITY_HEADERS
            .iter()
            .map(|(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect::<Vec<_>>();

        let csp = HeaderValue::from_str(&content_security_policy(env))
            .map_err(|e| AppError::Internal(format!("invalid CSP header value: {e}")))?;
        headers.push((HeaderName::from_static(CONTENT_SECURITY_POLICY), csp));

        Ok(Self { headers })
    }

    /// Insert (overwriting) every security header.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }
}
