//! Keyed job registry: at most one in-flight job per key.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, SyncError};

/// Tracks which keys currently have a running job.
///
/// Cloning shares the same registry.
#[derive(Debug)]
pub struct JobRegistry<K> {
    running: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for JobRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            running: self.running.clone(),
        }
    }
}

impl<K> Default for JobRegistry<K> {
    fn default() -> Self {
        Self {
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash + Clone + Debug> JobRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. The claim is released when the guard drops.
    pub fn try_start(&self, key: K) -> Result<JobGuard<K>> {
        let mut running = lock(&self.running);
        if !running.insert(key.clone()) {
            return Err(SyncError::JobAlreadyRunning(format!("{key:?}")));
        }
        tracing::debug!(key = ?key, "job started");
        Ok(JobGuard {
            key,
            running: self.running.clone(),
        })
    }

    pub fn is_running(&self, key: &K) -> bool {
        lock(&self.running).contains(key)
    }

    /// Keys with a job in flight, in no particular order.
    pub fn running(&self) -> Vec<K> {
        lock(&self.running).iter().cloned().collect()
    }
}

/// Proof that a job holds its key.
#[must_use = "the job key is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct JobGuard<K: Eq + Hash + Debug> {
    key: K,
    running: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Debug> JobGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Debug> Drop for JobGuard<K> {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.key);
        tracing::debug!(key = ?self.key, "job finished");
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock<K>(running: &Mutex<HashSet<K>>) -> MutexGuard<'_, HashSet<K>> {
    running.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_start_rejected_until_drop() {
        let registry = JobRegistry::new();
        let key = ("photos".to_string(), "backup".to_string());

        let guard = registry.try_start(key.clone()).unwrap();
        assert!(registry.is_running(&key));
        assert!(matches!(
            registry.try_start(key.clone()),
            Err(SyncError::JobAlreadyRunning(_))
        ));

        drop(guard);
        assert!(!registry.is_running(&key));
        let _again = registry.try_start(key).unwrap();
    }

    #[test]
    fn test_independent_keys_and_shared_clones() {
        let registry: JobRegistry<&str> = JobRegistry::new();
        let shared = registry.clone();

        let _a = registry.try_start("a").unwrap();
        let _b = shared.try_start("b").unwrap();

        let mut running = registry.running();
        running.sort();
        assert_eq!(running, vec!["a", "b"]);
        assert!(shared.try_start("a").is_err());
    }
}
