use anyhow::Result;
use muster_core::AttendanceWorkflow;
use muster_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod recognizer;

use config::Config;
use dbus_interface::AttendanceService;
use recognizer::DbusRecognizer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(db = %config.db_path.display(), "musterd starting");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&config.db_path).await?);

    let recognizer = Arc::new(
        DbusRecognizer::connect(Duration::from_secs(config.recognizer_timeout_secs)).await?,
    );

    let workflow = Arc::new(AttendanceWorkflow::new(
        recognizer,
        store.clone(),
        store.clone(),
        store,
    ));

    let _conn = zbus::connection::Builder::system()?
        .name("org.muster.Attendance1")?
        .serve_at("/org/muster/Attendance1", AttendanceService::new(workflow))?
        .build()
        .await?;

    tracing::info!("musterd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("musterd shutting down");

    Ok(())
}
