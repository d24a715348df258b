use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

struct Inner {
    queue: Mutex<VecDeque<Uuid>>,
    notify: Notify,
    capacity: usize,
}

/// Fire-and-forget click recording for the redirect path. The queue is
/// bounded; under pressure the oldest pending click is dropped so the
/// redirect itself never waits or fails.
#[derive(Clone)]
pub struct ClickTracker {
    inner: Arc<Inner>,
}

pub struct ClickWorker {
    inner: Arc<Inner>,
}

impl ClickTracker {
    pub fn new(capacity: usize) -> (ClickTracker, ClickWorker) {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        });
        (
            ClickTracker {
                inner: inner.clone(),
            },
            ClickWorker { inner },
        )
    }

    pub fn record(&self, option_id: Uuid) {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            if queue.len() >= self.inner.capacity {
                let dropped = queue.pop_front();
                tracing::warn!(?dropped, "click queue full, dropping oldest click");
            }
            queue.push_back(option_id);
        }
        self.inner.notify.notify_one();
    }

    #[cfg(test)]
    pub fn pending(&self) -> Vec<Uuid> {
        self.inner.queue.lock().unwrap().iter().copied().collect()
    }
}

impl ClickWorker {
    /// Drains the queue for the lifetime of the process. Outlives any single
    /// request; failures are logged and never surfaced.
    pub async fn run(self, db: PgPool) {
        loop {
            let batch: Vec<Uuid> = {
                let mut queue = self.inner.queue.lock().unwrap();
                queue.drain(..).collect()
            };
            if batch.is_empty() {
                self.inner.notify.notified().await;
                continue;
            }
            for option_id in batch {
                let res = sqlx::query("UPDATE affiliate_options SET clicks = clicks + 1 WHERE id = $1")
                    .bind(option_id)
                    .execute(&db)
                    .await;
                if let Err(e) = res {
                    tracing::warn!(error = %e, %option_id, "click tracking update failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_queue_drops_oldest() {
        let (tracker, _worker) = ClickTracker::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        tracker.record(a);
        tracker.record(b);
        tracker.record(c);
        assert_eq!(tracker.pending(), vec![b, c]);
    }
}
