use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{Duration, interval};
use tracing::{debug, error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use uptime_status_proxy::metrics::PrometheusMetrics;
use uptime_status_proxy::server::config::ServerConfig;
use uptime_status_proxy::status::{HttpFetcher, StatusResolver};
use uptime_status_proxy::version::VERSION;
use uptime_status_proxy::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // JSON to a daily-rotated file, human-readable to stdout
    let file_appender = rolling::daily(log_dir, "status-proxy.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("Status proxy version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    // Logging needs the configured directory, so config errors go to stderr.
    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(
        version = VERSION,
        environment = %config.environment,
        upstream = %config.upstream_url(),
        cache_ttl_secs = config.cache_ttl_secs,
        "Starting status proxy."
    );

    let metrics = Arc::new(PrometheusMetrics::new()?);
    let fetcher = Arc::new(HttpFetcher::new()?);
    let resolver = Arc::new(StatusResolver::new(
        fetcher,
        metrics.clone(),
        config.upstream_url(),
        config.cache_ttl(),
        config.fetch_timeout(),
    ));

    let app_state = Arc::new(AppState::new(config.clone(), resolver, metrics));

    // --- Rate limiter housekeeping ---
    let prune_handle = tokio::spawn({
        let limiter = app_state.rate_limiter.clone();
        let period = config.rate_limit_window();
        async move {
            let mut ticker = interval(period.max(Duration::from_secs(60)));
            loop {
                ticker.tick().await;
                let removed = limiter.prune();
                debug!(
                    removed,
                    tracked = limiter.tracked_clients(),
                    "Pruned expired rate limit windows."
                );
            }
        }
    });

    let app = create_axum_router(app_state);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    prune_handle.abort();
    info!("Status proxy stopped.");
    Ok(())
}
