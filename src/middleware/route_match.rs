//! Route classification for authentication gating.
//!
//! Paths are tested against two ordered pattern tables:
//!
//! | Protected | Public |
//! |---|---|
//! | `/` | `/sign-in` and sub-paths |
//! | `/upcoming` | `/sign-up` and sub-paths |
//! | `/previous` | `/api/webhooks` and sub-paths |
//! | `/recordings` | `/api/health` |
//! | `/personal-room` | |
//! | `/meeting` and sub-paths | |
//!
//! Public always wins: a path that matches both tables is never gated.
//!
//! # Pattern Semantics
//!
//! A `"/meeting(.*)"` style pattern is a plain string prefix, so it matches
//! `/meeting`, `/meeting/abc/def`, and also `/meetings`. Exact patterns
//! compare the whole path and accept one trailing `/`, so `/recordings/`
//! is gated like `/recordings`. All comparisons ignore ASCII case. Query
//! strings are never part of the path. Nothing is compiled into a regular
//! expression.

/// One entry of a route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePattern {
    /// Path must equal the pattern.
    Exact(&'static str),
    /// Path must start with the pattern (the pattern itself included).
    Prefix(&'static str),
}

impl RoutePattern {
    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(p) => {
                let trimmed = match path.strip_suffix('/') {
                    Some(rest) if !rest.is_empty() => rest,
                    _ => path,
                };
                trimmed.eq_ignore_ascii_case(p)
            }
            RoutePattern::Prefix(p) => starts_with_ignore_case(path, p),
        }
    }
}

#[inline]
fn starts_with_ignore_case(path: &str, prefix: &str) -> bool {
    path.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Paths that require a resolved caller identity.
pub const PROTECTED_ROUTES: &[RoutePattern] = &[
    RoutePattern::Exact("/"),
    RoutePattern::Exact("/upcoming"),
    RoutePattern::Exact("/previous"),
    RoutePattern::Exact("/recordings"),
    RoutePattern::Exact("/personal-room"),
    RoutePattern::Prefix("/meeting"),
];

/// Paths exempt from the authentication check.
pub const PUBLIC_ROUTES: &[RoutePattern] = &[
    RoutePattern::Prefix("/sign-in"),
    RoutePattern::Prefix("/sign-up"),
    RoutePattern::Prefix("/api/webhooks"),
    RoutePattern::Exact("/api/health"),
];

/// Prefix of the paths subject to API rate limiting.
pub const API_PREFIX: &str = "/api";

/// Outcome of classifying a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Listed in the public table (may also be protected; public wins).
    Public,
    /// Protected and not public: identity required.
    Protected,
    /// In neither table.
    Unlisted,
}

/// Ordered protected/public tables. First match wins within a table.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    protected: &'static [RoutePattern],
    public: &'static [RoutePattern],
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new(PROTECTED_ROUTES, PUBLIC_ROUTES)
    }
}

impl RouteMatcher {
    pub fn new(protected: &'static [RoutePattern], public: &'static [RoutePattern]) -> Self {
        Self { protected, public }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|p| p.matches(path))
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|p| p.matches(path))
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_public(path) {
            RouteClass::Public
        } else if self.is_protected(path) {
            RouteClass::Protected
        } else {
            RouteClass::Unlisted
        }
    }

    /// Whether the gate must resolve an identity before forwarding.
    #[inline]
    pub fn requires_auth(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Protected
    }
}

/// Whether the path is an API route (rate-limit candidate).
#[inline]
pub fn is_api_path(path: &str) -> bool {
    path.starts_with(API_PREFIX)
}
