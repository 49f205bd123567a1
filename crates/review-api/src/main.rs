//! # Review Service
//!
//! Binary entry point for the review HTTP API.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use review_api::config::{CacheBackendKind, ScyllaSettings, StorageBackend};
use review_api::{ApiContext, Config, build_router};
use review_persistence::cache::{Connector, MemoryConnector, MemoryStore, RedisConnector};
use review_persistence::{
    ConnectionManager, InMemoryReviewRepository, ScyllaClient, ScyllaConfig,
    ScyllaReviewRepository, SharedReviewRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(version = review_api::VERSION, "Starting review service");

    // Initialize review store
    let reviews: SharedReviewRepository = match config.storage {
        StorageBackend::Scylla => {
            tokio::select! {
                repo = connect_scylla(&config.scylla, config.cache.retry_delay) => repo,
                () = shutdown_signal() => return Ok(()),
            }
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory review store; reviews are lost on restart");
            Arc::new(InMemoryReviewRepository::new())
        }
    };

    // Initialize cache connection; the service serves uncached until it is live
    let connector: Arc<dyn Connector> = match config.cache.backend {
        CacheBackendKind::Redis => Arc::new(RedisConnector::new(config.cache.url.clone())),
        CacheBackendKind::Memory => Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new()))),
    };
    let connection = ConnectionManager::new(connector, config.cache.connection_config());
    tracing::info!(
        endpoint = %connection.endpoint(),
        namespace = %config.cache.namespace,
        ttl_secs = config.cache.ttl.as_secs(),
        "Starting cache connection"
    );
    connection.start();

    // Build API context
    let ctx = ApiContext::builder()
        .with_reviews(reviews)
        .with_connection(connection.clone())
        .with_namespace(config.cache.namespace.clone())
        .with_ttl(config.cache.ttl)
        .with_max_body_bytes(config.cache.max_body_bytes)
        .build()
        .map_err(anyhow::Error::msg)?;

    // Build router
    let app = build_router(ctx);

    // Start server
    let addr = config.server_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Review service listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Release the cache connection regardless of how serving ended
    if tokio::time::timeout(config.shutdown_timeout, connection.close())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_ms = config.shutdown_timeout.as_millis(),
            "Cache connection did not close in time"
        );
    }

    served?;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Connect to ScyllaDB, retrying until it accepts the session.
async fn connect_scylla(settings: &ScyllaSettings, retry_delay: Duration) -> SharedReviewRepository {
    let scylla_config = ScyllaConfig {
        hosts: settings.hosts.clone(),
        keyspace: settings.keyspace.clone(),
        username: settings.username.clone(),
        password: settings.password.clone(),
    };

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        tracing::info!(
            hosts = ?scylla_config.hosts,
            keyspace = %scylla_config.keyspace,
            attempt,
            "Connecting to ScyllaDB"
        );

        let connected = match ScyllaClient::new(scylla_config.clone()).await {
            Ok(client) => {
                let repo = ScyllaReviewRepository::new(Arc::new(client));
                repo.ensure_schema().await.map(|()| repo)
            }
            Err(err) => Err(err),
        };

        match connected {
            Ok(repo) => {
                tracing::info!("ScyllaDB connected");
                return Arc::new(repo);
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    retry_in_ms = retry_delay.as_millis(),
                    "ScyllaDB unavailable, retrying"
                );
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
