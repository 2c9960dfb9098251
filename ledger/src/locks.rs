//! Per-account exclusive sections.
//!
//! Each account gets its own mutex, created by its first locked write or
//! balance read and never removed. Read-only lookups never create entries.
//! The table lookup only holds a shard lock long enough to clone the handle,
//! so sections on different accounts never wait on each other.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::error::LedgerError;
use crate::types::AccountId;

#[derive(Default)]
pub struct AccountLocks {
    table: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: &AccountId) -> Arc<Mutex<()>> {
        if let Some(existing) = self.table.get(id) {
            return existing.clone();
        }
        self.table.entry(*id).or_default().clone()
    }

    /// Runs `section` while holding the lock for `id`.
    ///
    /// Callers must not enter another account's section from inside `section`;
    /// holding a single account lock at a time rules out lock-order deadlocks.
    pub fn with_account<T>(
        &self,
        id: &AccountId,
        section: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let handle = self.handle(id);
        let _guard = handle
            .lock()
            .map_err(|_| LedgerError::poisoned("account"))?;
        section()
    }

    /// Runs `section` under the lock for `id` only if the account already has
    /// one. Returns `Ok(None)` without touching the table otherwise.
    pub fn with_existing<T>(
        &self,
        id: &AccountId,
        section: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<Option<T>, LedgerError> {
        let Some(handle) = self.table.get(id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let _guard = handle
            .lock()
            .map_err(|_| LedgerError::poisoned("account"))?;
        section().map(Some)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn same_account_sections_do_not_overlap() {
        let locks = Arc::new(AccountLocks::new());
        let id = AccountId::new(Uuid::new_v4());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks
                            .with_account(&id, || {
                                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                                max_seen.fetch_max(now, Ordering::SeqCst);
                                inside.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn other_accounts_proceed_while_one_is_held() {
        let locks = Arc::new(AccountLocks::new());
        let a = AccountId::new(Uuid::new_v4());
        let b = AccountId::new(Uuid::new_v4());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let locks = locks.clone();
            thread::spawn(move || {
                locks
                    .with_account(&a, || {
                        entered_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            })
        };
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let other = {
            let locks = locks.clone();
            thread::spawn(move || {
                locks.with_account(&b, || Ok(())).unwrap();
                done_tx.send(()).unwrap();
            })
        };
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        other.join().unwrap();
    }

    #[test]
    fn with_existing_skips_unknown_accounts() {
        let locks = AccountLocks::new();
        let known = AccountId::new(Uuid::new_v4());
        locks.with_account(&known, || Ok(())).unwrap();

        for _ in 0..100 {
            let unknown = AccountId::new(Uuid::new_v4());
            let ran = locks.with_existing(&unknown, || Ok(())).unwrap();
            assert_eq!(ran, None);
        }
        assert_eq!(locks.len(), 1);

        assert_eq!(locks.with_existing(&known, || Ok(7)).unwrap(), Some(7));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn section_error_is_returned() {
        let locks = AccountLocks::new();
        let id = AccountId::new(Uuid::new_v4());
        let err = locks
            .with_account(&id, || -> Result<(), _> { Err(LedgerError::AmountOverflow) })
            .unwrap_err();
        assert_eq!(err, LedgerError::AmountOverflow);
        // lock is released after an error
        assert!(locks.with_account(&id, || Ok(())).is_ok());
    }
}
