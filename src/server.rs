//! Scheduler-process lifecycle: admin API plus the dispatcher loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::api::routes::create_router;
use crate::config::{Environment, Settings};
use crate::db::establish_async_connection_pool;
use crate::dispatcher::Dispatcher;
use crate::queue::{RedisWorkQueue, WorkQueue};
use crate::state::AppState;
use crate::storage::{MetadataStore, PgMetadataStore};

/// Scheduler process manager.
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn log_startup_config(&self) {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        tracing::info!(
            host = %self.settings.server.host,
            port = %self.settings.server.port,
            poll_interval_secs = self.settings.dispatcher.poll_interval_secs,
            batch_size = self.settings.dispatcher.batch_size,
            "Scheduler configuration loaded"
        );
    }

    /// Start the scheduler process and run until a shutdown signal.
    ///
    /// Brings up the database pool, the broker connection, the dispatcher
    /// loop, and the admin API; on shutdown the HTTP server drains first,
    /// then the dispatcher finishes its in-progress iteration.
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup_config();

        tracing::info!("Initializing database connection pool...");
        let pool = establish_async_connection_pool(&self.settings.database).await?;
        tracing::info!("Database connection pool initialized");

        tracing::info!("Connecting to broker...");
        let queue: Arc<dyn WorkQueue> =
            Arc::new(RedisWorkQueue::new(&self.settings.redis, &self.settings.queue).await?);
        queue.ping().await?;
        tracing::info!("Broker connected");

        let store: Arc<dyn MetadataStore> = Arc::new(PgMetadataStore::new(pool.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            store,
            queue.clone(),
            self.settings.dispatcher.clone(),
        ));

        let dispatcher_cancel = CancellationToken::new();
        let dispatcher_task = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let cancel = dispatcher_cancel.clone();
            async move { dispatcher.run(cancel).await }
        });

        let state = AppState::new(pool, queue);
        let router = create_router(state);
        tracing::info!("Router configured");

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;
        tracing::info!(address = %format!("http://{}", address), "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        dispatcher_cancel.cancel();
        if let Err(e) = dispatcher_task.await {
            tracing::warn!(error = %e, "Dispatcher task ended abnormally");
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
