use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use uuid::Uuid;

/// Caller-supplied account identifier. The engine never generates these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Ulid);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    /// Signed effect of `amount` on a running balance.
    pub fn delta(&self, amount: i64) -> i64 {
        match self {
            TransactionKind::Deposit => amount,
            TransactionKind::Withdrawal => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current balance of one account, in minor currency units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: i64,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    pub fn zero() -> Self {
        Self {
            amount: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Immutable record of one committed deposit or withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: i64,
    pub kind: TransactionKind,
    pub resulting_balance: i64,
    pub created_at: DateTime<Utc>,
    /// 1-based position in the global log, assigned on append.
    pub sequence: u64,
}

impl Transaction {
    pub(crate) fn new(
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        resulting_balance: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount,
            kind,
            resulting_balance,
            created_at,
            sequence: 0,
        }
    }
}
