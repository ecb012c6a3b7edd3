//! Service wiring: store, fetcher, renderer and the HTTP listener.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::fetch::HttpFetcher;
use crate::http::{build_router, AppState};
use crate::report::ReportRenderer;
use crate::store::SqliteRecordStore;

/// Ports probed after the configured one when it is taken.
pub const PORT_PROBE_ATTEMPTS: u16 = 20;

/// Returns the first port in `start..start + attempts` that can be bound on `host`.
pub fn find_available_port(host: &str, start: u16, attempts: u16) -> Option<u16> {
    (0..attempts)
        .filter_map(|offset| start.checked_add(offset))
        .find(|port| StdTcpListener::bind((host, *port)).is_ok())
}

/// Builds the renderer described by `config` on top of the SQLite store.
pub fn build_renderer(config: &Config) -> Result<ReportRenderer> {
    let store = SqliteRecordStore::open(&config.store.database_path)?;
    let fetcher = HttpFetcher::new(config.fetch_timeout());
    Ok(ReportRenderer::new(
        Arc::new(store),
        Arc::new(fetcher),
        config.report_settings(),
    ))
}

async fn bind(config: &Config) -> Result<TcpListener> {
    let host = config.server.host.as_str();
    let port = if config.server.find_free_port {
        match find_available_port(host, config.server.port, PORT_PROBE_ATTEMPTS) {
            Some(port) => {
                if port != config.server.port {
                    warn!(
                        "port {} is in use; falling back to {}",
                        config.server.port, port
                    );
                }
                port
            }
            None => config.server.port,
        }
    } else {
        config.server.port
    };

    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ReportError::Serve { addr, source })
}

/// Runs the HTTP service until Ctrl-C is received.
pub async fn serve(config: &Config) -> Result<()> {
    let renderer = build_renderer(config)?;
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| config.server.host.clone());
    info!("serving registration reports on http://{}", addr);

    let app = build_router(AppState::new(Arc::new(renderer)));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await
        .map_err(|source| ReportError::Serve { addr, source })
}
