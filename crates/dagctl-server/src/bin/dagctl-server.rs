//! Standalone server binary, grounded in
//! `orchestrator-server.rs`'s config-load -> db-connect -> router ->
//! graceful-shutdown shape, narrowed to this crate's YAML loader and
//! single router.

use std::net::SocketAddr;
use std::sync::Arc;

use dagctl_checkpoint::SqliteCheckpointStore;
use dagctl_core::{DefaultPermissionClassifier, Scheduler};
use dagctl_graphrag::{Graph, GraphRagStore, Hypergraph, ShgatParams};
use dagctl_server::api::{create_router, AppState};
use dagctl_server::config::{loader, Config};
use dagctl_server::executors::{DecliningPlanner, EchoToolExecutor, NoopCapabilityExecutor, NoopSandboxRunner};
use dagctl_server::db::SqliteDbClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("DAGCTL_CONFIG_PATH") {
        Ok(path) => loader::load_yaml_config(&path)?,
        Err(_) => {
            eprintln!("DAGCTL_CONFIG_PATH not set; running with defaults");
            Config::default()
        }
    };

    tracing_subscriber::fmt().with_env_filter(config.log_filter.clone()).init();
    tracing::info!(bind_addr = %config.bind_addr, database_url = %config.database_url, "starting dagctl-server");

    let db = Arc::new(SqliteDbClient::connect(&config.database_url).await?);
    let checkpoint_pool = sqlx::sqlite::SqlitePoolOptions::new().max_connections(5).connect(&config.database_url).await?;
    let checkpoint_store: Arc<dyn dagctl_checkpoint::CheckpointStore> =
        Arc::new(SqliteCheckpointStore::new(checkpoint_pool).await?);

    let graphrag = Arc::new(GraphRagStore::new(Graph::new(), Hypergraph::new(), ShgatParams::new(32, 4, 16, 3)));

    let scheduler = Arc::new(Scheduler::new(
        config.executor_config(),
        Arc::new(EchoToolExecutor),
        Arc::new(NoopSandboxRunner),
        Arc::new(NoopCapabilityExecutor),
        Arc::new(DecliningPlanner),
        Arc::new(DefaultPermissionClassifier),
        checkpoint_store.clone(),
    ));

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        config: Arc::new(config),
        scheduler,
        checkpoint_store,
        db,
        graphrag,
        running: Arc::new(dashmap::DashMap::new()),
    };

    let app = create_router(app_state);
    let addr: SocketAddr = bind_addr.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("dagctl-server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received sigterm"),
    }
}
