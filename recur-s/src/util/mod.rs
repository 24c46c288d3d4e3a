pub mod cmd;
pub mod config;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn default_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Filter from `RUST_LOG`-style directives, falling back to the build's default level.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level()))
}

pub fn init_logging() {
    // source locations and thread info only in debug builds
    let verbose = cfg!(debug_assertions);
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_ansi(!cfg!(windows))
        .with_target(false)
        .with_thread_ids(verbose)
        .with_thread_names(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .init();

    debug!("Logging initialized");
}

/// Resolves once SIGTERM or SIGINT (Ctrl-C elsewhere) is received.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return std::future::pending().await;
        }
        info!("Received Ctrl-C, shutting down gracefully...");
    }
}
