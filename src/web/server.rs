//! Web server for CHS Archive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::file::{BlobStore, FileService, RetentionSweeper};
use crate::{ArchiveError, Result};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;

/// Web server for the archive.
pub struct ArchiveServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Rate limit state.
    rate_limit_state: Arc<RateLimitState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
    /// Retention sweeper, started with the server.
    sweeper: RetentionSweeper,
}

/// A server accepting connections in the background.
pub struct RunningServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    background: Vec<JoinHandle<()>>,
}

impl ArchiveServer {
    /// Create a new server, opening the blob store.
    pub fn new(config: &Config) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ArchiveError::Config(format!("Invalid server address: {e}")))?;

        let store = BlobStore::open(&config.storage.path)?;
        tracing::info!("File storage initialized at: {}", config.storage.path);

        let files = FileService::from_config(store.clone(), &config.storage);
        let sweeper =
            RetentionSweeper::from_config(store, &config.retention).with_counter(files.counter());
        let app_state =
            AppState::new(files).with_public_base_url(config.server.public_base_url.as_str());

        let rate_limit_state = Arc::new(RateLimitState::new(
            Duration::from_secs(config.web.rate_limit_window_secs),
            config.web.rate_limit_max_requests,
        )
        .with_trusted_proxy_headers(config.web.trust_proxy_headers));

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            rate_limit_state,
            cors_origins: config.web.cors_origins.clone(),
            sweeper,
        })
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve in the background.
    ///
    /// The retention sweeper and rate limiter cleanup run alongside the
    /// server until [`RunningServer::shutdown`] is called.
    pub async fn start(self) -> Result<RunningServer> {
        let router = create_router(
            self.app_state,
            self.rate_limit_state.clone(),
            &self.cors_origins,
        );

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let background = vec![
            self.sweeper.spawn(cancel.clone()),
            self.rate_limit_state.start_cleanup_task(cancel.clone()),
        ];
        tracing::info!("Retention sweeper started");

        tracing::info!("Web server listening on http://{}", local_addr);

        let shutdown = cancel.clone();
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
        });

        Ok(RunningServer {
            addr: local_addr,
            cancel,
            server,
            background,
        })
    }

    /// Run the server until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let running = self.start().await?;
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        running.shutdown().await
    }
}

impl RunningServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections, drain in-flight requests and wait for the
    /// background tasks to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();

        let served = self.server.await;
        for handle in self.background {
            if let Err(e) = handle.await {
                tracing::warn!("Background task failed: {}", e);
            }
        }
        tracing::info!("Web server stopped");

        match served {
            Ok(result) => result.map_err(ArchiveError::from),
            Err(e) => Err(ArchiveError::Io(std::io::Error::other(e))),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
}
