use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Serializes work per form name while letting different names run in parallel.
#[derive(Clone, Default)]
pub struct NameLocks {
    inner: LockMap,
}

pub struct NameLockGuard {
    name: String,
    locks: LockMap,
    _guard: OwnedMutexGuard<()>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, name: &str) -> NameLockGuard {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(name.to_string()).or_default().clone()
        };
        let guard = entry.lock_owned().await;
        NameLockGuard {
            name: name.to_string(),
            locks: self.inner.clone(),
            _guard: guard,
        }
    }

    pub fn held_names(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for NameLockGuard {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // map entry + this guard; anything more means someone is waiting
        if map
            .get(&self.name)
            .is_some_and(|entry| Arc::strong_count(entry) <= 2)
        {
            map.remove(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_name_is_serialized() {
        let locks = NameLocks::new();
        let first = locks.lock("contact").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("contact").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.expect("waiter");
        assert_eq!(locks.held_names(), 0);
    }

    #[tokio::test]
    async fn different_names_do_not_block() {
        let locks = NameLocks::new();
        let _contact = locks.lock("contact").await;
        let survey = tokio::time::timeout(Duration::from_millis(200), locks.lock("survey")).await;
        assert!(survey.is_ok());
    }
}
