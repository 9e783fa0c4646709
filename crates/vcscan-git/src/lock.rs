//! Keyed async lock.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Per-key mutual exclusion for async work.
///
/// Calls for the same key run one at a time, in arrival order; calls for
/// different keys run fully in parallel. Work done under the lock should
/// re-check its cache before doing anything expensive, so a caller queued
/// behind an in-flight execution picks up that execution's result.
#[derive(Debug, Default)]
pub struct KeyedLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLock {
    /// Create a new lock.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Run `f` while holding the lock for `key`.
    pub async fn acquire<F, Fut, T>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = mutex.lock().await;
            f().await
        };

        drop(mutex);
        // Only the map holds the mutex now: nobody is waiting on this key.
        self.locks.remove_if(key, |_, m| Arc::strong_count(m) == 1);

        result
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let lock = Arc::new(KeyedLock::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let active = active.clone();
                let max_active = max_active.clone();
                tokio::spawn(async move {
                    lock.acquire("repo-root:/a", || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(lock.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_run_in_parallel() {
        let lock = Arc::new(KeyedLock::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        // The first key waits for a signal that only the second key sends.
        let first = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire("a", || async move { rx.await.is_ok() }).await })
        };
        let second = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.acquire("b", || async move {
                    let _ = tx.send(());
                })
                .await
            })
        };

        second.await.unwrap();
        assert!(first.await.unwrap());
    }

    #[tokio::test]
    async fn test_waiter_sees_first_result() {
        let lock = Arc::new(KeyedLock::new());
        let cache = Arc::new(DashMap::<String, usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let cache = cache.clone();
                let runs = runs.clone();
                tokio::spawn(async move {
                    lock.acquire("k", || async move {
                        if let Some(v) = cache.get("k") {
                            return *v;
                        }
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        cache.insert("k".to_string(), 42);
                        42
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
