use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Monotonic per-key counters with TTL, backed by the in-memory atomic
/// store. Entries older than their TTL are treated as reset on next access
/// rather than actively swept.
pub struct CounterService {
    entries: Mutex<HashMap<String, (u64, Instant)>>,
}

impl Default for CounterService {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterService {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Atomically bump `key` and return the post-increment value. If the
    /// existing entry is older than `ttl`, it is treated as absent first.
    pub async fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let value = match entries.get(key) {
            Some((v, at)) if now.duration_since(*at) < ttl => v + 1,
            _ => 1,
        };
        entries.insert(key.to_string(), (value, now));
        value
    }

    pub async fn get(&self, key: &str, ttl: Duration) -> u64 {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some((v, at)) if Instant::now().duration_since(*at) < ttl => *v,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increments_are_monotonic() {
        let svc = CounterService::new();
        assert_eq!(svc.incr("k", Duration::from_secs(60)).await, 1);
        assert_eq!(svc.incr("k", Duration::from_secs(60)).await, 2);
        assert_eq!(svc.get("k", Duration::from_secs(60)).await, 2);
    }

    #[tokio::test]
    async fn expired_entry_resets() {
        let svc = CounterService::new();
        svc.incr("k", Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(svc.incr("k", Duration::from_millis(1)).await, 1);
    }
}
