use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;

/// Process-local set of revoked token strings, each with a self-eviction
/// deadline (the token's own expiry). Reads dominate writes.
#[derive(Debug, Default)]
pub struct RevocationSet {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token: &str, evict_at: DateTime<Utc>) {
        self.entries
            .write()
            .unwrap()
            .insert(token.to_string(), evict_at);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries.read().unwrap().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose eviction deadline has passed; returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, evict_at| *evict_at > now);
        before - entries.len()
    }
}

/// Background eviction task with an explicit handle. Runs hourly in
/// production; the cadence is injectable for tests.
pub struct RevocationSweeper {
    handle: JoinHandle<()>,
}

impl RevocationSweeper {
    pub fn start(set: Arc<RevocationSet>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = set.sweep();
                if removed > 0 {
                    info!(removed, "Swept expired token revocations");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn revoked_until_swept() {
        let set = RevocationSet::new();
        set.revoke("token-a", Utc::now() + TimeDelta::hours(1));
        set.revoke("token-b", Utc::now() - TimeDelta::seconds(1));

        assert!(set.is_revoked("token-a"));
        assert!(set.is_revoked("token-b"));

        assert_eq!(set.sweep(), 1);
        assert!(set.is_revoked("token-a"));
        assert!(!set.is_revoked("token-b"));
    }

    #[test]
    fn unknown_tokens_are_not_revoked() {
        let set = RevocationSet::new();
        assert!(!set.is_revoked("never-seen"));
        assert_eq!(set.sweep(), 0);
    }

    #[tokio::test]
    async fn sweeper_evicts_on_cadence() {
        let set = Arc::new(RevocationSet::new());
        set.revoke("stale", Utc::now() - TimeDelta::seconds(5));

        let sweeper = RevocationSweeper::start(Arc::clone(&set), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(set.is_empty());
        sweeper.stop();
    }
}
