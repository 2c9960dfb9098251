use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid amount {amount} (must be > 0)")]
    InvalidAmount { amount: i64 },
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },
    #[error("amount overflow: balance would exceed the representable range")]
    AmountOverflow,
    #[error("internal ledger failure: {0}")]
    Unknown(String),
}

impl LedgerError {
    /// True for rejections caused by the request itself rather than by the ledger.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount { .. } | LedgerError::InsufficientFunds { .. }
        )
    }

    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::AmountOverflow => "amount_overflow",
            LedgerError::Unknown(_) => "unknown",
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        LedgerError::Unknown(format!("{what} lock poisoned"))
    }
}
