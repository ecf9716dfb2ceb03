//! paysync - one-shot initial sync from Stripe into the local store.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paysync_service::{open_store, AppState, ServiceConfig};
use paysync_sync::SyncProgress;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paysync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting paysync");

    let config = ServiceConfig::from_env()?;

    tracing::info!(
        data_dir = %config.data_dir,
        workspace_id = ?config.workspace_id,
        stripe_configured = %config.stripe_api_key.is_some(),
        entity_types = ?config.entity_types,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    let state = AppState::new(store, config)?;

    let session = state.run_initial_sync().await?;
    let progress = SyncProgress::from_session(&session);

    tracing::info!(
        session_id = %session.id,
        status = ?session.status,
        processed = progress.total_processed,
        failed = progress.total_failed,
        "Initial sync finished"
    );
    println!("{}", serde_json::to_string_pretty(&session)?);

    if let Some(errors) = &session.error_summary {
        tracing::warn!(%errors, "Sync reported errors");
    }
    Ok(())
}
