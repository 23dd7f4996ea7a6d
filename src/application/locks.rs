use crate::domain::ids::SplitId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per split.
///
/// Every read-modify-write of a split aggregate runs while holding its guard, so
/// payment marks, reconciliation and completion checks on the same split are
/// serialized while different splits proceed independently. A slot only lives
/// while someone holds or waits on it.
#[derive(Default)]
pub struct SplitLocks {
    slots: Mutex<HashMap<SplitId, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one split. Releasing it drops the slot when nobody else
/// is waiting.
pub struct SplitGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a SplitLocks,
    split_id: SplitId,
}

impl Drop for SplitGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(self.split_id);
    }
}

impl SplitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, split_id: SplitId) -> SplitGuard<'_> {
        let guard = self.slot(split_id).lock_owned().await;
        SplitGuard {
            guard: Some(guard),
            locks: self,
            split_id,
        }
    }

    /// Number of splits currently locked or waited on.
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn slot(&self, split_id: SplitId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(split_id).or_default().clone()
    }

    // Slots are only cloned under the map lock, so a count of 1 means no
    // holder and no waiter.
    fn release(&self, split_id: SplitId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&split_id)
            && Arc::strong_count(slot) == 1
        {
            slots.remove(&split_id);
        }
    }
}
