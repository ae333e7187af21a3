use thiserror::Error;

use crate::domain::{Cents, format_cents};

fn money(cents: &Cents) -> String {
    format_cents(*cents)
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No accounts found")]
    NoAccounts,

    #[error(
        "Insufficient funds in account {iban}: balance {}, required {}",
        money(.balance),
        money(.required)
    )]
    InsufficientFunds {
        iban: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Database error: {0}")]
    Store(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    /// Caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::Store(_))
    }
}
