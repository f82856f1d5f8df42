use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use super::{drain, Deliver};
use crate::db::DbPool;

/// Runs until every `NotificationQueue` handle is dropped. Rows left over from a
/// previous run are drained once at startup.
pub fn spawn_worker(
    db: DbPool,
    deliver: Arc<dyn Deliver>,
    mut wake: Receiver<()>,
    batch_size: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(batch_size, "notification worker started");
        drain_until_idle(&db, deliver.as_ref(), batch_size).await;

        while wake.recv().await.is_some() {
            drain_until_idle(&db, deliver.as_ref(), batch_size).await;
        }

        tracing::info!("notification worker stopped");
    })
}

async fn drain_until_idle(db: &DbPool, deliver: &dyn Deliver, batch_size: i64) {
    loop {
        match drain(db, deliver, batch_size).await {
            Ok(report) => {
                if report.fetched > 0 {
                    tracing::debug!(?report, "notification batch drained");
                }
                // A short batch means the queue is empty. A batch with no successful
                // delivery means retrying now would spin on the same rows.
                if (report.fetched as i64) < batch_size || report.delivered == 0 {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("notification drain failed: {}", e);
                return;
            }
        }
    }
}
