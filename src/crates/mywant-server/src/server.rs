//! Bootstrap sequence shared by the `mywant-server` binary and `mywant-cli
//! start`: register the builtin types, restore the prior snapshot, start
//! the periodic writer, and serve until shutdown.

use std::sync::Arc;

use mywant_core::{Orchestrator, TypeRegistry};
use mywant_snapshot::{FileSnapshotStore, SnapshotStore, SnapshotWriter};

use crate::config::ServerConfig;

/// Run the HTTP control plane until it receives a shutdown signal.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let registry = TypeRegistry::new();
    mywant_core::builtins::register_all(&registry);
    let orchestrator = Arc::new(Orchestrator::new(registry));

    let store = Arc::new(FileSnapshotStore::new(config.snapshot_path.clone()));
    let restored = store.load_all().await?;
    if !restored.is_empty() {
        // Snapshot restoration reconstructs history for inspection; it does
        // not respawn execution tasks — a restored want needs an explicit
        // `create` to run again.
        tracing::info!(
            count = restored.len(),
            path = %config.snapshot_path.display(),
            "found a prior snapshot; wants will not auto-restart"
        );
    }

    let orchestrator_for_writer = orchestrator.clone();
    let writer = SnapshotWriter::spawn(store, config.snapshot_interval, move || {
        let orchestrator = orchestrator_for_writer.clone();
        async move { snapshot_of(&orchestrator) }
    });

    let app = crate::create_router(orchestrator.clone());

    tracing::info!(addr = %config.bind_addr, "starting mywant-server");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    writer.shutdown().await;
    tracing::info!("mywant-server shut down gracefully");
    Ok(())
}

fn snapshot_of(orchestrator: &Orchestrator) -> mywant_snapshot::Snapshot {
    orchestrator
        .snapshot_wants()
        .into_iter()
        .map(|want| {
            (
                want.id().to_string(),
                mywant_snapshot::SnapshotRecord {
                    metadata: serde_json::to_value(&want.metadata).unwrap_or_default(),
                    spec: serde_json::to_value(&want.spec).unwrap_or_default(),
                    status: format!("{:?}", want.status).to_lowercase(),
                    state: want.state.get().into(),
                    history: serde_json::to_value(&want.history).unwrap_or_default(),
                },
            )
        })
        .collect()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
