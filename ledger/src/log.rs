//! Append-only transaction log.
//!
//! One global sequence in commit order plus an index of positions per account,
//! so account history is read without scanning unrelated records.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::LedgerError;
use crate::types::{AccountId, Transaction};

#[derive(Default)]
struct Entries {
    records: Vec<Transaction>,
    by_account: HashMap<AccountId, Vec<usize>>,
}

#[derive(Default)]
pub struct TransactionLog {
    inner: RwLock<Entries>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` at the end of the log and returns it with its
    /// sequence number filled in.
    pub fn append(&self, mut record: Transaction) -> Result<Transaction, LedgerError> {
        let mut entries = self
            .inner
            .write()
            .map_err(|_| LedgerError::poisoned("transaction log"))?;
        let position = entries.records.len();
        record.sequence = position as u64 + 1;
        entries.records.push(record);
        entries
            .by_account
            .entry(record.account_id)
            .or_default()
            .push(position);
        Ok(record)
    }

    /// Snapshot of every record for `account`, in append order.
    pub fn list_for(&self, account: &AccountId) -> Result<Vec<Transaction>, LedgerError> {
        let entries = self
            .inner
            .read()
            .map_err(|_| LedgerError::poisoned("transaction log"))?;
        Ok(entries
            .by_account
            .get(account)
            .map(|positions| positions.iter().map(|&p| entries.records[p]).collect())
            .unwrap_or_default())
    }

    /// Up to `limit` records with a sequence greater than `after_sequence`.
    pub fn page(
        &self,
        limit: usize,
        after_sequence: u64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let entries = self
            .inner
            .read()
            .map_err(|_| LedgerError::poisoned("transaction log"))?;
        let start = usize::try_from(after_sequence)
            .unwrap_or(usize::MAX)
            .min(entries.records.len());
        Ok(entries.records[start..].iter().take(limit).copied().collect())
    }

    /// Number of committed records. Appends are single pushes, so the count
    /// stays accurate even after a panic poisoned the lock.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
