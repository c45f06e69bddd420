use std::sync::Arc;
use std::time::Duration;

use fellah_agent::llm::{phraser_from_config, PhraserError};
use fellah_agent::runtime::AgentRuntime;
use fellah_agent::session::{InMemorySessionStore, SessionPolicy, SessionStore};
use fellah_core::config::{AppConfig, ConfigError, LoadOptions};
use fellah_db::repositories::{
    ReferenceRepository, RepositoryError, SqlInventoryLedger, SqlOrderStore,
    SqlReferenceRepository,
};
use fellah_db::{connect_from_config, migrations, DbPool};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<dyn SessionStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("reference data could not be loaded: {0}")]
    ReferenceData(#[source] RepositoryError),
    #[error("phraser setup failed: {0}")]
    Phraser(#[from] PhraserError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let reference = SqlReferenceRepository::new(db_pool.clone())
        .load_reference_data()
        .await
        .map_err(BootstrapError::ReferenceData)?;
    if reference.catalog.products().is_empty() {
        warn!(
            event_name = "system.bootstrap.empty_catalog",
            correlation_id = "bootstrap",
            "product catalog is empty; run `fellah seed` to load the demo marketplace"
        );
    }
    info!(
        event_name = "system.bootstrap.reference_loaded",
        correlation_id = "bootstrap",
        products = reference.catalog.products().len(),
        farmers = reference.farmers.len(),
        clients = reference.clients.len(),
        "reference data loaded"
    );

    let ledger = Arc::new(SqlInventoryLedger::new(db_pool.clone()));
    let phraser = phraser_from_config(&config.llm, &reference, ledger.as_ref()).await?;
    let sessions: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(SessionPolicy::from(&config.session)));

    let runtime = AgentRuntime::new(
        Arc::new(reference),
        ledger,
        Arc::new(SqlOrderStore::new(db_pool.clone())),
        Arc::clone(&sessions),
        phraser,
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime), sessions })
}

/// Periodically evicts idle sessions until the task is aborted.
pub fn spawn_session_sweep(sessions: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle().await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                info!(event_name = "system.sessions.swept", evicted, remaining, "idle sessions swept");
            }
        }
    })
}
