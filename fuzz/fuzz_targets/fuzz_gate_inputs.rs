//! Fuzz testing for the request inputs the edge gate parses.
//!
//! Every request reaching the gate has its path classified and, on `/api`,
//! its forwarding headers parsed for a client IP. Both run before any
//! authentication, so they must hold up against arbitrary input:
//!
//! - Never panic on any path or header value
//! - Classification is consistent: public paths never require auth
//! - The extracted client IP carries no surrounding whitespace
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_gate_inputs -- -max_total_time=60
//! ```

#![no_main]

use axum::http::{HeaderMap, HeaderValue};
use libfuzzer_sys::fuzz_target;
use nexthub_gate::middleware::{RouteClass, RouteMatcher, extract_client_ip, is_api_path};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let routes = RouteMatcher::default();
    let class = routes.classify(s);
    assert_eq!(routes.requires_auth(s), class == RouteClass::Protected);
    if routes.is_public(s) {
        assert_eq!(class, RouteClass::Public);
    }
    let _ = is_api_path(s);

    if let Ok(value) = HeaderValue::from_bytes(data) {
        for name in ["x-forwarded-for", "x-real-ip"] {
            let mut headers = HeaderMap::new();
            headers.insert(name, value.clone());
            let ip = extract_client_ip(&headers);
            assert_eq!(ip.trim(), ip.as_ref());
        }
    }
});
