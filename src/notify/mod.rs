//! Donor notification queue.
//!
//! Rows are written with `processed = 0` and a background worker drains them in
//! priority order, highest first and oldest first within a priority. `enqueue` only
//! signals the worker; HTTP handlers never wait on delivery.

mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::db::models::{Notification, NotificationKind, Priority};
use crate::db::{self, DbPool, NewNotification};

pub use worker::spawn_worker;

pub const DEFAULT_BATCH_SIZE: i64 = 50;

/// Delivery backend for a single notification. Returning an error leaves the row
/// unprocessed so a later drain retries it.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// In-app feed delivery: the row itself is what the donor reads, so delivering is
/// recording that it went out.
pub struct FeedDelivery;

#[async_trait]
impl Deliver for FeedDelivery {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            id = notification.id,
            user_id = %notification.user_id,
            priority = ?notification.priority,
            "notification delivered"
        );
        Ok(())
    }
}

/// Handle shared through `AppState`. Cloning is cheap.
#[derive(Clone)]
pub struct NotificationQueue {
    db: DbPool,
    wake: mpsc::Sender<()>,
}

impl NotificationQueue {
    /// Returns the handle and the receiver the worker must own.
    pub fn new(db: DbPool) -> (Self, mpsc::Receiver<()>) {
        // Capacity one: pending wake-ups coalesce into a single drain.
        let (wake, rx) = mpsc::channel(1);
        (Self { db, wake }, rx)
    }

    pub async fn enqueue(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        priority: Priority,
    ) -> Result<i64, sqlx::Error> {
        let id = db::insert_notification(
            &self.db,
            &NewNotification {
                user_id,
                kind,
                title,
                message,
                priority,
            },
            Utc::now(),
        )
        .await?;
        self.wake();
        Ok(id)
    }

    /// One row per donor account, inserted atomically. Returns how many were queued.
    pub async fn broadcast(
        &self,
        title: &str,
        message: &str,
        priority: Priority,
    ) -> Result<usize, sqlx::Error> {
        let donors = db::list_donors(&self.db).await?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        for donor in &donors {
            db::insert_notification(
                &mut *tx,
                &NewNotification {
                    user_id: &donor.id,
                    kind: NotificationKind::Broadcast,
                    title,
                    message,
                    priority,
                },
                now,
            )
            .await?;
        }
        tx.commit().await?;

        if !donors.is_empty() {
            self.wake();
        }
        Ok(donors.len())
    }

    fn wake(&self) {
        // Full means a drain is already pending; closed means we are shutting down.
        let _ = self.wake.try_send(());
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers up to `limit` unprocessed notifications in queue order.
///
/// Each row is claimed before delivery, so concurrent drains never hand the same row
/// to `deliver` twice. A failed delivery releases its claim.
pub async fn drain(
    pool: &DbPool,
    deliver: &dyn Deliver,
    limit: i64,
) -> Result<DrainReport, sqlx::Error> {
    let batch = db::fetch_undelivered(pool, limit).await?;
    let mut report = DrainReport {
        fetched: batch.len(),
        ..DrainReport::default()
    };

    for notification in &batch {
        if !db::claim_notification(pool, notification.id).await? {
            continue;
        }
        match deliver.deliver(notification).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(id = notification.id, "notification delivery failed: {:#}", e);
                db::release_notification(pool, notification.id).await?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

pub fn default_deliver() -> Arc<dyn Deliver> {
    Arc::new(FeedDelivery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Deliver for Recorder {
        async fn deliver(&self, n: &Notification) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((n.id, n.title.clone()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Deliver for Failing {
        async fn deliver(&self, _n: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("gateway down")
        }
    }

    async fn setup() -> (DbPool, NotificationQueue, mpsc::Receiver<()>) {
        let pool = db::init_memory_pool().await.expect("init pool");
        db::create_user(&pool, "d1", "Donatur Satu", "d1@example.com", "x", Role::Donatur, Utc::now())
            .await
            .expect("create user");
        let (queue, rx) = NotificationQueue::new(pool.clone());
        (pool, queue, rx)
    }

    fn titles(rec: &Recorder) -> Vec<String> {
        rec.seen.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    #[tokio::test]
    async fn drains_by_priority_then_creation_order() {
        let (pool, queue, _rx) = setup().await;
        let plan = [
            ("low-1", Priority::Low),
            ("normal-1", Priority::Normal),
            ("high-1", Priority::High),
            ("low-2", Priority::Low),
            ("high-2", Priority::High),
            ("normal-2", Priority::Normal),
        ];
        for (title, priority) in plan {
            queue
                .enqueue("d1", NotificationKind::System, title, "isi", priority)
                .await
                .expect("enqueue");
        }

        let rec = Recorder::default();
        let report = drain(&pool, &rec, DEFAULT_BATCH_SIZE).await.expect("drain");
        assert_eq!(report.delivered, 6);
        assert_eq!(
            titles(&rec),
            vec!["high-1", "high-2", "normal-1", "normal-2", "low-1", "low-2"]
        );
        assert!(db::fetch_undelivered(&pool, 50).await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn drain_respects_limit() {
        let (pool, queue, _rx) = setup().await;
        for i in 0..5 {
            queue
                .enqueue("d1", NotificationKind::System, &format!("n{}", i), "isi", Priority::Normal)
                .await
                .expect("enqueue");
        }
        let rec = Recorder::default();
        let first = drain(&pool, &rec, 3).await.expect("drain");
        assert_eq!(first.fetched, 3);
        let second = drain(&pool, &rec, 3).await.expect("drain");
        assert_eq!(second.fetched, 2);
        assert_eq!(titles(&rec), vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[tokio::test]
    async fn concurrent_drains_deliver_each_row_once() {
        let (pool, queue, _rx) = setup().await;
        for i in 0..20 {
            queue
                .enqueue("d1", NotificationKind::System, &format!("n{}", i), "isi", Priority::Normal)
                .await
                .expect("enqueue");
        }
        let rec = Recorder::default();
        let (a, b) = tokio::join!(drain(&pool, &rec, 50), drain(&pool, &rec, 50));
        let total = a.expect("drain a").delivered + b.expect("drain b").delivered;
        assert_eq!(total, 20);

        let mut ids: Vec<i64> = rec.seen.lock().unwrap().iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn failed_delivery_stays_queued() {
        let (pool, queue, _rx) = setup().await;
        queue
            .enqueue("d1", NotificationKind::System, "retry me", "isi", Priority::High)
            .await
            .expect("enqueue");

        let report = drain(&pool, &Failing, 50).await.expect("drain");
        assert_eq!(report.failed, 1);
        assert_eq!(db::fetch_undelivered(&pool, 50).await.expect("fetch").len(), 1);

        let rec = Recorder::default();
        drain(&pool, &rec, 50).await.expect("drain");
        assert_eq!(titles(&rec), vec!["retry me"]);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_donor_only() {
        let (pool, queue, mut rx) = setup().await;
        db::create_user(&pool, "d2", "Donatur Dua", "d2@example.com", "x", Role::Donatur, Utc::now())
            .await
            .expect("create user");
        db::create_user(&pool, "a1", "Admin", "admin@example.com", "x", Role::Admin, Utc::now())
            .await
            .expect("create admin");

        let sent = queue
            .broadcast("Kajian", "Kajian ba'da maghrib", Priority::Normal)
            .await
            .expect("broadcast");
        assert_eq!(sent, 2);
        assert!(rx.try_recv().is_ok(), "broadcast should wake the worker");
        assert!(db::list_user_notifications(&pool, "a1").await.expect("list").is_empty());
        assert_eq!(db::list_user_notifications(&pool, "d2").await.expect("list").len(), 1);
    }
}
