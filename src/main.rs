use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use nexthub_gate::config::RuntimeEnv;
use nexthub_gate::counter_store::UpstashStore;
use nexthub_gate::db::{self, PgUserRepository};
use nexthub_gate::identity::{ClerkClient, ClerkSettings};
use nexthub_gate::middleware::SlidingWindowLimiter;
use nexthub_gate::{AppError, AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    let environment = config
        .as_ref()
        .map(|c| c.environment)
        .unwrap_or_default();
    let log_level = config.as_ref().ok().and_then(|c| c.log_level.clone());
    let log_dir = config.as_ref().ok().and_then(|c| c.log_dir.clone());
    init_tracing(environment, log_level.as_deref(), log_dir.as_deref());

    info!(
        "Starting nexthub gate v{} ({environment})",
        env!("CARGO_PKG_VERSION")
    );

    let config = match config {
        Ok(config) => config,
        Err(AppError::Config(violations)) => {
            for violation in &violations {
                error!(category = "config", "Invalid environment variable: {violation}");
            }
            return ExitCode::from(exitcode::CONFIG as u8);
        }
        Err(e) => {
            error!(category = "config", "Configuration error: {e}");
            return ExitCode::from(exitcode::CONFIG as u8);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Development logs human-readable at `debug`, production JSON at `warn`.
/// `RUST_LOG` overrides the level in every environment. With `LOG_DIR` set,
/// events are also appended as JSON to `all.log`, and errors to `error.log`.
fn init_tracing(environment: RuntimeEnv, log_level: Option<&str>, log_dir: Option<&str>) {
    let default_level = match environment {
        RuntimeEnv::Development => "debug",
        RuntimeEnv::Test => "info",
        RuntimeEnv::Production => "warn",
    };
    let filter = log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    let console = if environment == RuntimeEnv::Production {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    let mut open_error = None;
    let (all_log, error_log) = match log_dir.map(|dir| utils::open_log_files(Path::new(dir))) {
        Some(Ok(files)) => (
            Some(fmt::layer().json().with_writer(Arc::new(files.all))),
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Arc::new(files.errors))
                    .with_filter(LevelFilter::ERROR),
            ),
        ),
        Some(Err(e)) => {
            open_error = Some(e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(all_log)
        .with(error_log)
        .init();

    if let (Some(dir), Some(e)) = (log_dir, open_error) {
        warn!("Cannot open log files in {dir}, logging to stdout only: {e}");
    }
}

/// Run the application, returning an exit code on error.
async fn run(config: Config) -> Result<(), exitcode::ExitCode> {
    info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        rate_limiting = config.rate_limiting_enabled(),
        "Configuration loaded"
    );
    if config.error_monitoring_enabled() {
        info!("Error monitoring DSN configured");
    }

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    // Shared outbound HTTP client (identity provider, counter store)
    let http = reqwest::Client::builder()
        .timeout(config.http_client_timeout)
        .connect_timeout(config.http_client_timeout)
        .build()
        .map_err(|e| {
            error!("Failed to build HTTP client: {e}");
            exitcode::SOFTWARE
        })?;

    info!(category = "database", "Connecting to database...");
    let pool = db::connect(&config.database_url).await.map_err(|e| {
        error!(category = "database", "Failed to connect to database: {e}");
        exitcode::UNAVAILABLE
    })?;
    let users = Arc::new(PgUserRepository::new(pool));

    let identity = ClerkClient::new(
        http.clone(),
        ClerkSettings {
            api_url: config.clerk_api_url.clone(),
            secret_key: config.clerk_secret_key.clone(),
            jwt_key: config.clerk_jwt_key.clone(),
        },
    )
    .map_err(|e| {
        error!(category = "authentication", "Invalid identity provider settings: {e}");
        exitcode::CONFIG
    })?;
    if config.clerk_jwt_key.is_none() {
        info!(category = "authentication", "CLERK_JWT_KEY not set, session keys will be fetched from JWKS");
    }

    let limiter = match (&config.upstash_redis_rest_url, &config.upstash_redis_rest_token) {
        (Some(url), Some(token)) => {
            let store = UpstashStore::new(http.clone(), url.clone(), token.clone());
            Some(SlidingWindowLimiter::new(Arc::new(store)))
        }
        (None, None) => None,
        _ => {
            warn!(
                category = "security",
                "Only one of UPSTASH_REDIS_REST_URL / UPSTASH_REDIS_REST_TOKEN is set, rate limiting disabled"
            );
            None
        }
    };

    let state = AppState::new(config.clone(), Arc::new(identity), users, limiter);
    let app = build_router(state).map_err(|e| {
        error!("Failed to build router: {e}");
        exitcode::CONFIG
    })?;

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("  GET  /api/health        - Health check");
    info!("  HEAD /api/health        - Readiness probe");
    info!("  POST /api/stream/token  - Video token for the signed-in user");
    info!("  *                       - Front end from {}", config.static_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {e}");
            exitcode::SOFTWARE
        })?;

    info!("Server shutdown complete");
    Ok(())
}
