//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables (or a `.env` file).
//! Unlike a development sandbox, this service talks to hosted collaborators,
//! so the credentials below are **required** and the process refuses to start
//! without them. Every violation is collected and reported at once.
//!
//! # Required
//!
//! - `DATABASE_URL`: PostgreSQL connection URL for the profile mirror
//! - `NEXT_PUBLIC_CLERK_PUBLISHABLE_KEY`, `CLERK_SECRET_KEY`: identity provider
//! - `NEXT_PUBLIC_STREAM_API_KEY`, `STREAM_SECRET_KEY`: video backend
//! - `NEXT_PUBLIC_BASE_URL`: public origin of the application
//!
//! # Rate Limiting
//!
//! - `UPSTASH_REDIS_REST_URL`, `UPSTASH_REDIS_REST_TOKEN`: when **both** are
//!   present the API rate limiter is active; otherwise it is disabled for the
//!   lifetime of the process.
//!
//! # Error Monitoring
//!
//! - `NEXT_PUBLIC_SENTRY_DSN`, `SENTRY_ORG`, `SENTRY_PROJECT`, `SENTRY_AUTH_TOKEN`

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::{AppError, AppResult};

/// Runtime environment tag (`NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnv {
    #[default]
    Development,
    Test,
    Production,
}

impl RuntimeEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeEnv::Development => "development",
            RuntimeEnv::Test => "test",
            RuntimeEnv::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, RuntimeEnv::Development)
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(RuntimeEnv::Development),
            "test" => Ok(RuntimeEnv::Test),
            "production" => Ok(RuntimeEnv::Production),
            other => Err(format!(
                "expected one of 'development', 'test', 'production', got '{other}'"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Directory holding the pre-built front end (default: "public")
    pub static_dir: String,

    /// Runtime environment (`NODE_ENV`, default: development)
    pub environment: RuntimeEnv,

    /// Public origin of the application (`NEXT_PUBLIC_BASE_URL`)
    pub base_url: String,

    // =========================================================================
    // Datastore
    // =========================================================================
    /// PostgreSQL connection URL
    pub database_url: SecretString,

    // =========================================================================
    // Identity Provider (Clerk)
    // =========================================================================
    pub clerk_publishable_key: String,

    pub clerk_secret_key: SecretString,

    /// Where unauthenticated callers are redirected (default: "/sign-in")
    pub sign_in_url: String,

    pub sign_up_url: String,

    pub sign_in_force_redirect_url: String,

    pub sign_up_force_redirect_url: String,

    /// PEM public key for networkless session verification.
    /// When absent the JWKS is fetched from the Clerk Backend API.
    pub clerk_jwt_key: Option<String>,

    /// Clerk Backend API base URL (default: "https://api.clerk.com")
    pub clerk_api_url: String,

    // =========================================================================
    // Video Backend (Stream.io)
    // =========================================================================
    pub stream_api_key: String,

    pub stream_secret_key: SecretString,

    // =========================================================================
    // Rate Limiting (Upstash Redis)
    // =========================================================================
    pub upstash_redis_rest_url: Option<String>,

    pub upstash_redis_rest_token: Option<SecretString>,

    // =========================================================================
    // Error Monitoring (Sentry)
    // =========================================================================
    pub sentry_dsn: Option<String>,

    pub sentry_org: Option<String>,

    pub sentry_project: Option<String>,

    pub sentry_auth_token: Option<SecretString>,

    // =========================================================================
    // Outbound HTTP
    // =========================================================================
    /// Timeout applied to calls to Upstash and Clerk (default: 10 seconds)
    pub http_client_timeout: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log filter override (`RUST_LOG`); derived from the environment when unset
    pub log_level: Option<String>,

    /// Directory for JSON log files (`all.log`, `error.log`); console only when unset
    pub log_dir: Option<String>,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

/// Collects every violation while reading variables, so that all of them can
/// be reported before the process exits.
struct EnvReader<F> {
    lookup: F,
    errors: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            errors: Vec::new(),
        }
    }

    /// Non-empty value, or `None` when unset or blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&mut self, name: &str) -> String {
        match self.optional(name) {
            Some(value) => value,
            None => {
                self.errors.push(format!("{name}: required"));
                String::new()
            }
        }
    }

    fn with_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn required_url(&mut self, name: &str) -> String {
        let value = self.required(name);
        if !value.is_empty() {
            self.check_url(name, &value);
        }
        value
    }

    fn optional_url(&mut self, name: &str) -> Option<String> {
        let value = self.optional(name)?;
        self.check_url(name, &value);
        Some(value)
    }

    fn check_url(&mut self, name: &str, value: &str) {
        if let Err(e) = Url::parse(value) {
            self.errors.push(format!("{name}: invalid url ({e})"));
        }
    }

    /// Parse a variable into the specified type with a default value.
    fn parse<T>(&mut self, name: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            Some(val) => match val.parse() {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.errors.push(format!("{name}: {e}"));
                    default
                }
            },
            None => default,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` listing every missing or malformed value.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an explicit key/value map.
    pub fn from_map(vars: &HashMap<String, String>) -> AppResult<Self> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let config = Self {
            // Server
            host: env.with_default("HOST", "0.0.0.0"),
            port: env.parse("PORT", 3000),
            static_dir: env.with_default("STATIC_DIR", "public"),
            environment: env.parse("NODE_ENV", RuntimeEnv::Development),
            base_url: env.required_url("NEXT_PUBLIC_BASE_URL"),

            // Datastore
            database_url: SecretString::from(env.required_url("DATABASE_URL")),

            // Clerk
            clerk_publishable_key: env.required("NEXT_PUBLIC_CLERK_PUBLISHABLE_KEY"),
            clerk_secret_key: SecretString::from(env.required("CLERK_SECRET_KEY")),
            sign_in_url: env.with_default("NEXT_PUBLIC_CLERK_SIGN_IN_URL", "/sign-in"),
            sign_up_url: env.with_default("NEXT_PUBLIC_CLERK_SIGN_UP_URL", "/sign-up"),
            sign_in_force_redirect_url: env
                .with_default("NEXT_PUBLIC_CLERK_SIGN_IN_FORCE_REDIRECT_URL", "/"),
            sign_up_force_redirect_url: env
                .with_default("NEXT_PUBLIC_CLERK_SIGN_UP_FORCE_REDIRECT_URL", "/"),
            clerk_jwt_key: env.optional("CLERK_JWT_KEY"),
            clerk_api_url: env.with_default("CLERK_API_URL", "https://api.clerk.com"),

            // Stream
            stream_api_key: env.required("NEXT_PUBLIC_STREAM_API_KEY"),
            stream_secret_key: SecretString::from(env.required("STREAM_SECRET_KEY")),

            // Upstash
            upstash_redis_rest_url: env.optional_url("UPSTASH_REDIS_REST_URL"),
            upstash_redis_rest_token: env
                .optional("UPSTASH_REDIS_REST_TOKEN")
                .map(SecretString::from),

            // Sentry
            sentry_dsn: env.optional("NEXT_PUBLIC_SENTRY_DSN"),
            sentry_org: env.optional("SENTRY_ORG"),
            sentry_project: env.optional("SENTRY_PROJECT"),
            sentry_auth_token: env.optional("SENTRY_AUTH_TOKEN").map(SecretString::from),

            // Outbound HTTP
            http_client_timeout: Duration::from_secs(env.parse("HTTP_CLIENT_TIMEOUT_SECS", 10)),

            // Observability
            log_level: env.optional("RUST_LOG"),
            log_dir: env.optional("LOG_DIR"),
            metrics_port: env.parse("METRICS_PORT", 9090),
        };

        if !env.errors.is_empty() {
            return Err(AppError::Config(env.errors));
        }

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if !self.sign_in_url.starts_with('/') && Url::parse(&self.sign_in_url).is_err() {
            return Err(AppError::ConfigError(format!(
                "NEXT_PUBLIC_CLERK_SIGN_IN_URL must be a path or absolute URL, got '{}'",
                self.sign_in_url
            )));
        }

        if self.http_client_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "HTTP_CLIENT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if the API rate limiter should be constructed.
    ///
    /// Both Upstash settings must be present; a partial configuration
    /// disables rate limiting rather than failing startup.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.upstash_redis_rest_url.is_some() && self.upstash_redis_rest_token.is_some()
    }

    /// Check if an error-monitoring DSN was supplied.
    pub fn error_monitoring_enabled(&self) -> bool {
        self.sentry_dsn.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }
}

/// Default configuration for testing.
///
/// Credentials are left empty; production deployments must use
/// `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: "public".to_string(),
            environment: RuntimeEnv::Development,
            base_url: "http://localhost:3000".to_string(),
            // Datastore
            database_url: SecretString::from("postgres://localhost/nexthub"),
            // Clerk
            clerk_publishable_key: String::new(),
            clerk_secret_key: SecretString::from(""),
            sign_in_url: "/sign-in".to_string(),
            sign_up_url: "/sign-up".to_string(),
            sign_in_force_redirect_url: "/".to_string(),
            sign_up_force_redirect_url: "/".to_string(),
            clerk_jwt_key: None,
            clerk_api_url: "https://api.clerk.com".to_string(),
            // Stream
            stream_api_key: String::new(),
            stream_secret_key: SecretString::from(""),
            // Upstash
            upstash_redis_rest_url: None,
            upstash_redis_rest_token: None,
            // Sentry
            sentry_dsn: None,
            sentry_org: None,
            sentry_project: None,
            sentry_auth_token: None,
            // Outbound HTTP
            http_client_timeout: Duration::from_secs(10),
            // Observability
            log_level: None,
            log_dir: None,
            metrics_port: 9090,
        }
    }
}
