//! Current balance per account.
//!
//! The store only guarantees that each map operation is atomic on its own.
//! Read-modify-write sequences are serialized by the engine's per-account
//! locks, which also cover the matching log append.

use dashmap::DashMap;

use crate::types::{AccountId, Balance};

#[derive(Default)]
pub struct AccountStore {
    balances: DashMap<AccountId, Balance>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    /// Returns the balance for `id`, creating a zero balance on first touch.
    /// Concurrent first touches observe the same created entry.
    pub fn get_or_init(&self, id: &AccountId) -> Balance {
        *self.balances.entry(*id).or_insert_with(Balance::zero)
    }

    pub fn get(&self, id: &AccountId) -> Option<Balance> {
        self.balances.get(id).map(|entry| *entry)
    }

    /// Unconditional overwrite. Callers hold the account lock.
    pub fn put(&self, id: AccountId, balance: Balance) {
        self.balances.insert(id, balance);
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
