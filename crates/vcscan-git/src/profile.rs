//! Hash timing instrumentation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of hashing activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashProfile {
    /// Number of objects hashed.
    pub calls: u64,
    /// Total time spent hashing.
    pub total: Duration,
}

impl HashProfile {
    /// Mean time per hashed object.
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Accumulates hashing time across concurrent scans.
#[derive(Debug, Default)]
pub struct HashProfiler {
    calls: AtomicU64,
    nanos: AtomicU64,
}

impl HashProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await `fut` and record how long it took.
    pub async fn time<Fut, T>(&self, fut: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let output = fut.await;
        self.record(start.elapsed());
        output
    }

    pub fn record(&self, elapsed: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.nanos
            .fetch_add(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HashProfile {
        HashProfile {
            calls: self.calls.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.nanos.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_empty_profile() {
        assert_eq!(HashProfile::default().mean(), Duration::ZERO);
    }

    #[test]
    fn test_record_accumulates() {
        let profiler = HashProfiler::new();
        profiler.record(Duration::from_millis(2));
        profiler.record(Duration::from_millis(4));

        let profile = profiler.snapshot();
        assert_eq!(profile.calls, 2);
        assert_eq!(profile.total, Duration::from_millis(6));
        assert_eq!(profile.mean(), Duration::from_millis(3));
    }

    #[tokio::test]
    async fn test_time_wraps_future() {
        let profiler = HashProfiler::new();
        let value = profiler.time(async { 7 }).await;
        assert_eq!(value, 7);
        assert_eq!(profiler.snapshot().calls, 1);
    }
}
