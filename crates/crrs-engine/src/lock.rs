//! Per-subject serialisation of score computations.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Hands out one async mutex per subject. Different subjects never wait on
/// each other.
#[derive(Default)]
pub struct SubjectLocks {
  slots: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SubjectLocks {
  pub fn new() -> Self { Self::default() }

  pub async fn acquire(&self, subject_id: Uuid) -> OwnedMutexGuard<()> {
    let slot = {
      let mut slots = self.slots.lock().await;
      // A slot referenced only by the map has no holder and no waiter.
      slots.retain(|_, slot| Arc::strong_count(slot) > 1);
      slots.entry(subject_id).or_default().clone()
    };
    slot.lock_owned().await
  }

  #[cfg(test)]
  async fn len(&self) -> usize { self.slots.lock().await.len() }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn same_subject_waits() {
    let locks = Arc::new(SubjectLocks::new());
    let subject = Uuid::new_v4();
    let guard = locks.acquire(subject).await;

    let waiter = {
      let locks = locks.clone();
      tokio::spawn(async move { locks.acquire(subject).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    assert!(waiter.await.is_ok());
  }

  #[tokio::test]
  async fn different_subjects_do_not_block() {
    let locks = SubjectLocks::new();
    let _a = locks.acquire(Uuid::new_v4()).await;
    let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4())).await;
    assert!(b.is_ok());
  }

  #[tokio::test]
  async fn idle_slots_are_pruned() {
    let locks = SubjectLocks::new();
    for _ in 0..10 {
      drop(locks.acquire(Uuid::new_v4()).await);
    }
    let _held = locks.acquire(Uuid::new_v4()).await;
    assert_eq!(locks.len().await, 1);
  }
}
