use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CounterStore, CounterStoreError, SlidingWindow, WindowOutcome};

/// In-process sliding log.
///
/// Exact (not approximated) sliding window: each admitted hit is stored with
/// its timestamp and hits older than the window are pruned on access. A
/// single mutex makes increment-and-check atomic. At most once per window,
/// a hit also drops every key that has gone idle, so memory stays bounded by
/// the clients seen in the last two windows. State is per process, so this
/// store does not coordinate across replicas.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    state: Arc<Mutex<LogState>>,
}

#[derive(Debug, Default)]
struct LogState {
    logs: HashMap<String, VecDeque<i64>>,
    last_sweep_ms: Option<i64>,
}

impl LogState {
    fn sweep(&mut self, cutoff: i64, now_ms: i64) {
        self.logs.retain(|_, log| log.back().is_some_and(|&t| t > cutoff));
        self.last_sweep_ms = Some(now_ms);
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.state.lock().await.logs.len()
    }

    /// Drop keys whose every hit is older than `window` at `now_ms`.
    pub async fn prune(&self, window: SlidingWindow, now_ms: i64) {
        let cutoff = now_ms - window.window_ms();
        self.state.lock().await.sweep(cutoff, now_ms);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(
        &self,
        key: &str,
        window: SlidingWindow,
        now_ms: i64,
    ) -> Result<WindowOutcome, CounterStoreError> {
        let window_ms = window.window_ms();
        let cutoff = now_ms - window_ms;
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);

        let mut state = self.state.lock().await;
        match state.last_sweep_ms {
            Some(last) if now_ms - last < window_ms => {}
            Some(_) => state.sweep(cutoff, now_ms),
            None => state.last_sweep_ms = Some(now_ms),
        }
        let log = state.logs.entry(key.to_string()).or_default();

        while log.front().is_some_and(|&t| t <= cutoff) {
            log.pop_front();
        }

        let admitted = log.len() < limit;
        if admitted {
            log.push_back(now_ms);
        }

        let used = u32::try_from(log.len()).unwrap_or(u32::MAX);
        let reset_ms = log.front().map_or(now_ms + window_ms, |&t| t + window_ms);

        Ok(WindowOutcome {
            admitted,
            remaining: window.limit.saturating_sub(used),
            reset_ms,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    const WINDOW: SlidingWindow = SlidingWindow::new(10, Duration::from_secs(10));

    #[tokio::test]
    async fn test_admits_up_to_limit_then_rejects() {
        let store = MemoryCounterStore::new();

        for i in 0..10 {
            let outcome = store.hit("k", WINDOW, 1_000 + i).await.unwrap();
            assert!(outcome.admitted, "hit {i} should be admitted");
            assert_eq!(outcome.remaining, 9 - u32::try_from(i).unwrap());
        }

        let eleventh = store.hit("k", WINDOW, 1_500).await.unwrap();
        assert!(!eleventh.admitted);
        assert_eq!(eleventh.remaining, 0);
        assert_eq!(eleventh.reset_ms, 11_000);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let store = MemoryCounterStore::new();

        for i in 0..10 {
            store.hit("k", WINDOW, i * 1_000).await.unwrap();
        }
        assert!(!store.hit("k", WINDOW, 9_999).await.unwrap().admitted);

        // The first hit (t=0) leaves the window at t=10_000
        let outcome = store.hit("k", WINDOW, 10_000).await.unwrap();
        assert!(outcome.admitted);
        assert_eq!(outcome.remaining, 0);
    }

    #[tokio::test]
    async fn test_rejected_hits_are_not_recorded() {
        let store = MemoryCounterStore::new();
        for _ in 0..25 {
            store.hit("k", WINDOW, 0).await.unwrap();
        }

        // Only the ten admitted hits occupy the window
        assert!(store.hit("k", WINDOW, 10_001).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryCounterStore::new();
        for _ in 0..10 {
            store.hit("a", WINDOW, 0).await.unwrap();
        }

        assert!(!store.hit("a", WINDOW, 1).await.unwrap().admitted);
        assert!(store.hit("b", WINDOW, 1).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_prune_drops_idle_keys() {
        let store = MemoryCounterStore::new();
        store.hit("old", WINDOW, 0).await.unwrap();
        store.hit("fresh", WINDOW, 15_000).await.unwrap();

        store.prune(WINDOW, 15_000).await;
        assert_eq!(store.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn test_idle_keys_are_dropped_by_later_hits() {
        let store = MemoryCounterStore::new();
        for i in 0..100 {
            store.hit(&format!("client-{i}"), WINDOW, i).await.unwrap();
        }
        assert_eq!(store.tracked_keys().await, 100);

        // Still inside the first window: nothing is swept
        store.hit("late", WINDOW, 9_000).await.unwrap();
        assert_eq!(store.tracked_keys().await, 101);

        store.hit("next", WINDOW, 12_000).await.unwrap();
        assert_eq!(store.tracked_keys().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_hits_never_exceed_limit() {
        let store = MemoryCounterStore::new();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.hit("shared", WINDOW, 0).await.unwrap().admitted
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
