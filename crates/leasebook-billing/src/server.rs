use crate::api;
use crate::config::{BillingConfig, StorageBackend};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::reconciler::{LedgerReconciler, ReconcilerSettings};
use crate::storage::{
    self, ContractRepository, InMemoryLedgerStore, ReceivableRepository, SqlContractRepository,
    SqlReceivableRepository,
};

use axum::{routing::get, Router};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BillingConfig>,
    pub reconciler: Arc<LedgerReconciler>,
    pub receivables: Arc<dyn ReceivableRepository + Send + Sync>,
}

/// Full application router: API routes, health check and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors);

    Router::new()
        .nest("/api/v1", api::routes())
        .route("/health", get(api::routes::health::health_check))
        .layer(middleware)
        .with_state(state)
}

/// Billing server that hosts the HTTP service
pub struct BillingServer {
    config: BillingConfig,
    state: AppState,
    pool: Option<PgPool>,
}

impl BillingServer {
    /// Build a server over explicit repositories and clock
    pub fn with_repositories(
        config: BillingConfig,
        contracts: Arc<dyn ContractRepository + Send + Sync>,
        receivables: Arc<dyn ReceivableRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = ReconcilerSettings::from(&config.reconciliation);
        let reconciler = Arc::new(LedgerReconciler::new(
            contracts,
            receivables.clone(),
            clock,
            settings,
        ));

        let state = AppState {
            config: Arc::new(config.clone()),
            reconciler,
            receivables,
        };

        Self {
            config,
            state,
            pool: None,
        }
    }

    pub async fn new_with_config(config: BillingConfig) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory ledger store; data is lost on shutdown");
                let store = Arc::new(InMemoryLedgerStore::new());
                Ok(Self::with_repositories(
                    config,
                    store.clone(),
                    store,
                    Arc::new(SystemClock),
                ))
            }
            StorageBackend::Postgres => {
                let pool = storage::connect(&config.database)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

                let mut server = Self::with_repositories(
                    config,
                    Arc::new(SqlContractRepository::new(pool.clone())),
                    Arc::new(SqlReceivableRepository::new(pool.clone())),
                    Arc::new(SystemClock),
                );
                server.pool = Some(pool);
                Ok(server)
            }
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        let Some(pool) = &self.pool else {
            info!("No database configured, skipping migrations");
            return Ok(());
        };

        info!("Running database migrations");
        storage::run_migrations(pool).await.map_err(|e| {
            error!("Failed to run database migrations: {}", e);
            anyhow::anyhow!("Migration failed: {}", e)
        })
    }

    pub async fn run_with_listener(
        self,
        listener: tokio::net::TcpListener,
        shutdown_signal: tokio::sync::oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Starting billing HTTP server on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = shutdown_signal.await;
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        self.shutdown().await
    }

    pub async fn serve(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.http.listen_address, self.config.http.port
        )
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            shutdown_signal.await;
            let _ = tx.send(());
        });

        self.run_with_listener(listener, rx).await
    }

    /// Graceful shutdown
    async fn shutdown(self) -> anyhow::Result<()> {
        info!("Shutting down billing server");

        if let Some(pool) = self.pool {
            info!("Closing database connections");
            pool.close().await;
        }

        info!("Billing server shutdown complete");
        Ok(())
    }
}
