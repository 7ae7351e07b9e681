use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::SittingId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// In-process mutual exclusion per sitting. Storage revisions guard the same
/// writes across processes; this keeps one process from racing itself.
#[derive(Clone, Default)]
pub(crate) struct SittingLocks {
    inner: Arc<Mutex<HashMap<SittingId, Arc<AsyncMutex<()>>>>>,
}

impl SittingLocks {
    pub(crate) async fn acquire(&self, id: SittingId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_sitting_is_serialized_and_released_locks_are_pruned() {
        let locks = SittingLocks::default();
        let id = SittingId::generate();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();

        let _other = locks.acquire(SittingId::generate()).await;
        assert_eq!(locks.tracked(), 1);
    }
}
