//! The ledger engine: atomic deposit/withdrawal over the account store and
//! the transaction log.
//!
//! Every operation on an account runs inside that account's exclusive
//! section: read balance, validate, compute, append to the log, commit the
//! balance. A failed operation leaves both the balance and the log untouched.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::locks::AccountLocks;
use crate::log::TransactionLog;
use crate::store::AccountStore;
use crate::types::{AccountId, Balance, Transaction, TransactionKind};

const DEFAULT_PAGE_LIMIT: usize = 100;
const MAX_PAGE_LIMIT: usize = 1000;

struct Inner {
    accounts: AccountStore,
    log: TransactionLog,
    locks: AccountLocks,
}

#[derive(Clone)]
pub struct LedgerEngine {
    inner: Arc<Inner>,
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                accounts: AccountStore::new(),
                log: TransactionLog::new(),
                locks: AccountLocks::new(),
            }),
        }
    }

    pub fn deposit(&self, account: AccountId, amount: i64) -> Result<Transaction, LedgerError> {
        self.apply(account, amount, TransactionKind::Deposit)
    }

    pub fn withdraw(&self, account: AccountId, amount: i64) -> Result<Transaction, LedgerError> {
        self.apply(account, amount, TransactionKind::Withdrawal)
    }

    /// Current balance, zero for an account that was never touched.
    pub fn get_balance(&self, account: AccountId) -> Result<Balance, LedgerError> {
        let inner = &self.inner;
        inner
            .locks
            .with_account(&account, || Ok(inner.accounts.get_or_init(&account)))
    }

    /// The account's history in commit order.
    ///
    /// An account without a lock entry has never committed anything, so its
    /// history is empty and no entry is created for it.
    pub fn get_transactions(&self, account: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        let inner = &self.inner;
        let history = inner
            .locks
            .with_existing(&account, || inner.log.list_for(&account))?;
        Ok(history.unwrap_or_default())
    }

    /// Global view of the log across accounts, for cursor-style paging.
    /// Returns the page and the sequence of its last record.
    pub fn list_transactions(
        &self,
        limit: usize,
        after_sequence: u64,
    ) -> Result<(Vec<Transaction>, Option<u64>), LedgerError> {
        let mut limit = limit;
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            limit = DEFAULT_PAGE_LIMIT;
        }
        let page = self.inner.log.page(limit, after_sequence)?;
        let last = page.last().map(|tx| tx.sequence);
        Ok((page, last))
    }

    pub fn account_count(&self) -> usize {
        self.inner.accounts.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.log.len()
    }

    fn apply(
        &self,
        account: AccountId,
        amount: i64,
        kind: TransactionKind,
    ) -> Result<Transaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let inner = &self.inner;
        inner.locks.with_account(&account, || {
            let current = inner.accounts.get_or_init(&account);
            let next = next_balance(current.amount, amount, kind).map_err(|err| {
                warn!(%account, %kind, amount, balance = current.amount, reason = err.reason(), "transaction rejected");
                err
            })?;

            let now = Utc::now();
            let tx = inner
                .log
                .append(Transaction::new(account, amount, kind, next, now))?;
            inner.accounts.put(
                account,
                Balance {
                    amount: next,
                    updated_at: now,
                },
            );

            debug!(%account, %kind, amount, balance = next, sequence = tx.sequence, "transaction committed");
            Ok(tx)
        })
    }
}

fn next_balance(current: i64, amount: i64, kind: TransactionKind) -> Result<i64, LedgerError> {
    let next = match kind {
        TransactionKind::Deposit => current
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?,
        TransactionKind::Withdrawal => {
            if current < amount {
                return Err(LedgerError::InsufficientFunds {
                    balance: current,
                    requested: amount,
                });
            }
            current - amount
        }
    };
    if next < 0 {
        return Err(LedgerError::Unknown(format!(
            "balance would become negative ({next})"
        )));
    }
    Ok(next)
}
