//! Process watchdog.
//!
//! Both pipelines must feed their named slot at least every 30 seconds; a
//! stale feed means a pipeline wedged, and the only recovery is an
//! intentional restart. The monitor reports the starved task to the gateway
//! top level, which exits the process.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Watchdog over a set of named feeds.
#[derive(Clone)]
pub struct Watchdog {
    feeds: Arc<Mutex<HashMap<&'static str, Instant>>>,
    limit: Duration,
}

/// Feeding handle for one task.
#[derive(Clone)]
pub struct WatchdogHandle {
    feeds: Arc<Mutex<HashMap<&'static str, Instant>>>,
    name: &'static str,
}

impl Watchdog {
    /// Create a watchdog with the given staleness limit.
    #[must_use]
    pub fn new(limit: Duration) -> Self {
        Self { feeds: Arc::new(Mutex::new(HashMap::new())), limit }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Instant>> {
        self.feeds.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a task and get its feeding handle. The slot starts fresh.
    #[must_use]
    pub fn register(&self, name: &'static str) -> WatchdogHandle {
        self.lock().insert(name, Instant::now());
        WatchdogHandle { feeds: Arc::clone(&self.feeds), name }
    }

    /// Name of the first registered task whose feed is stale, if any.
    #[must_use]
    pub fn starved(&self) -> Option<&'static str> {
        let now = Instant::now();
        self.lock()
            .iter()
            .find(|&(_, &fed)| now.duration_since(fed) > self.limit)
            .map(|(&name, _)| name)
    }

    /// Run the monitor: checks every second and returns the name of the
    /// first task that misses its deadline. The caller terminates the
    /// process.
    pub async fn watch(self) -> &'static str {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Some(name) = self.starved() {
                tracing::error!(task = name, "watchdog missed reset");
                return name;
            }
        }
    }
}

impl WatchdogHandle {
    /// Reset this task's deadline.
    pub fn feed(&self) {
        let now = Instant::now();
        self.feeds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(self.name, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_feeds_are_not_starved() {
        let dog = Watchdog::new(Duration::from_secs(30));
        let handle = dog.register("rx");
        handle.feed();
        assert_eq!(dog.starved(), None);
    }

    #[test]
    fn stale_feed_is_reported() {
        let dog = Watchdog::new(Duration::from_millis(0));
        let _handle = dog.register("rx");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(dog.starved(), Some("rx"));
    }
}
