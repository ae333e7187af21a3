use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, as_decimal, now};

pub type TransactionId = Uuid;

/// Direction of a ledger entry. Amounts are always positive; the kind says
/// whether money entered or left the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::TransferOut => "TRANSFER_OUT",
            TransactionKind::TransferIn => "TRANSFER_IN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "WITHDRAW" => Some(TransactionKind::Withdraw),
            "TRANSFER_OUT" => Some(TransactionKind::TransferOut),
            "TRANSFER_IN" => Some(TransactionKind::TransferIn),
            _ => None,
        }
    }

    /// Returns true if entries of this kind increase the owning balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }

    /// Signed effect of an entry of this kind on the owning balance.
    pub fn signed(&self, amount: Cents) -> Cents {
        if self.is_credit() { amount } else { -amount }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable ledger entry owned by exactly one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    /// Store-assigned insertion order, used to break timestamp ties
    #[serde(skip)]
    pub sequence: i64,
    pub account_id: String,
    #[serde(with = "as_decimal")]
    pub amount: Cents,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new entry. The sequence number is assigned by the repository.
    pub fn new(account_id: impl Into<String>, amount: Cents, kind: TransactionKind) -> Self {
        assert!(amount > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            account_id: account_id.into(),
            amount,
            kind,
            created_at: now(),
        }
    }
}

/// Replay a statement into the balance it implies.
pub fn net_effect(transactions: &[Transaction]) -> Cents {
    transactions
        .iter()
        .map(|tx| tx.kind.signed(tx.amount))
        .sum()
}
