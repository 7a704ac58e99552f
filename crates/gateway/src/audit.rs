//! Asynchronous audit pipeline.
//!
//! Handlers enqueue events and move on; a worker drains the queue into
//! the audit store, enriching each event with country/region when a geo
//! resolver is configured. The queue is bounded: on backlog the oldest
//! pending events are dropped and counted, so audit can never
//! back-pressure request serving.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use agw_domain::model::AuditEvent;
use agw_providers::GeoResolver;
use agw_store::AuditStore;

const DEFAULT_CAPACITY: usize = 4096;

struct Inner {
    queue: Mutex<VecDeque<AuditEvent>>,
    notify: Notify,
    dropped: AtomicU64,
    capacity: usize,
}

/// Cheap handle handed to every request task.
#[derive(Clone)]
pub struct AuditHandle {
    inner: Arc<Inner>,
}

impl AuditHandle {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Enqueue an event. Never blocks; on overflow the oldest pending
    /// event is discarded and the drop counter incremented.
    pub fn record(&self, event: AuditEvent) {
        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(event);
        drop(queue);
        self.inner.notify.notify_one();
    }

    /// Events discarded because the worker fell behind.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    fn drain(&self, max: usize) -> Vec<AuditEvent> {
        let mut queue = self.inner.queue.lock();
        let take = queue.len().min(max);
        queue.drain(..take).collect()
    }
}

impl Default for AuditHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the drain worker. Exits after a final flush when `shutdown`
/// fires.
pub fn spawn_worker(
    handle: AuditHandle,
    store: Arc<dyn AuditStore>,
    geo: Arc<dyn GeoResolver>,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let batch = handle.drain(256);
            if batch.is_empty() {
                tokio::select! {
                    _ = handle.inner.notify.notified() => continue,
                    _ = shutdown.notified() => break,
                }
            }
            write_batch(&store, &geo, batch).await;
        }
        // Final flush so shutdown does not lose already-enqueued events.
        let rest = handle.drain(usize::MAX);
        if !rest.is_empty() {
            write_batch(&store, &geo, rest).await;
        }
        tracing::debug!("audit worker stopped");
    })
}

async fn write_batch(
    store: &Arc<dyn AuditStore>,
    geo: &Arc<dyn GeoResolver>,
    batch: Vec<AuditEvent>,
) {
    for mut event in batch {
        if event.country.is_none() {
            if let Some(ip) = event.ip.clone() {
                if let Some(info) = geo.lookup(&ip).await {
                    event.country = info.country;
                    event.region = info.region;
                }
            }
        }
        // A failed audit write must never fail the primary operation; it
        // is logged and dropped.
        if let Err(e) = store.append(event).await {
            tracing::warn!(error = %e, "audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::model::AuditOutcome;
    use agw_providers::geoip::NoopGeoResolver;
    use agw_store::{AuditFilter, MemoryStore};
    use agw_domain::model::PageRequest;

    fn event(action: &str) -> AuditEvent {
        AuditEvent::new(action, "auth", AuditOutcome::Success)
    }

    #[tokio::test]
    async fn worker_drains_into_the_store() {
        let handle = AuditHandle::new();
        let store = Arc::new(MemoryStore::new());
        let shutdown = Arc::new(Notify::new());
        let worker = spawn_worker(
            handle.clone(),
            store.clone(),
            Arc::new(NoopGeoResolver),
            shutdown.clone(),
        );

        handle.record(event("signin"));
        handle.record(event("signup"));

        // Give the worker a moment, then stop it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.notify_waiters();
        worker.await.unwrap();

        let page = store
            .list(AuditFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(handle.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let handle = AuditHandle::with_capacity(2);
        handle.record(event("a"));
        handle.record(event("b"));
        handle.record(event("c"));

        assert_eq!(handle.dropped(), 1);
        let drained = handle.drain(usize::MAX);
        let actions: Vec<&str> = drained.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["b", "c"]);
    }
}
