use std::time::Duration;

use tracing::{info, warn};

use crate::config::{RETENTION_CHECK_SECS, retention_days};
use crate::store::RankStore;

/// Daily cleanup of rank snapshots for participants not seen within the
/// retention period.
pub async fn run(state: crate::state::AppState) {
    let Some(store) = state.store.as_ref().cloned() else {
        warn!("snapshot retention disabled: no rank store configured");
        return;
    };

    info!(
        "Snapshot retention started (retention: {}d, check interval: {}s)",
        retention_days(),
        RETENTION_CHECK_SECS
    );

    run_cleanup_once(store.as_ref()).await;

    let mut interval = tokio::time::interval(Duration::from_secs(RETENTION_CHECK_SECS));
    // Consume immediate tick so subsequent cleanup runs after the configured interval.
    interval.tick().await;

    loop {
        interval.tick().await;
        run_cleanup_once(store.as_ref()).await;
    }
}

async fn run_cleanup_once(store: &dyn RankStore) {
    let retention = retention_days();
    let cutoff = chrono::Utc::now() - chrono::Duration::days(retention);

    match store.prune(cutoff).await {
        Ok(removed) if removed > 0 => {
            info!("Retention cleanup: removed {removed} rank snapshots older than {retention}d");
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to prune old rank snapshots: {e}"),
    }
}
