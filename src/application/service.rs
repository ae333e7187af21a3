use tracing::{info, instrument};

use crate::domain::{Account, Cents, Transaction, TransactionKind, format_cents};
use crate::storage::{LedgerTx, Repository};

use super::LedgerError;

/// How many fresh ibans to try before giving up on account creation.
const MAX_IBAN_ATTEMPTS: usize = 5;

/// Application service providing the ledger operations.
/// This is the only interface the HTTP layer talks to.
///
/// Every operation that moves money runs inside one store transaction, so a
/// failure at any step leaves the ledger exactly as it was.
pub struct LedgerService {
    repo: Repository,
}

/// Outcome of a successful transfer: both accounts after the move.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
    pub amount: Cents,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Connect to the database at `database_url` and apply migrations.
    pub async fn init(database_url: &str) -> Result<Self, LedgerError> {
        let repo = Repository::init(database_url).await?;
        Ok(Self::new(repo))
    }

    /// Release the store connections. Call once, at shutdown.
    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Account operations
    // ========================

    /// List every account. An empty ledger is reported as
    /// [`LedgerError::NoAccounts`] rather than an empty list.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let accounts = self.repo.list_accounts().await?;
        if accounts.is_empty() {
            return Err(LedgerError::NoAccounts);
        }
        Ok(accounts)
    }

    /// Get an account by iban.
    pub async fn get_account(&self, iban: &str) -> Result<Account, LedgerError> {
        self.repo
            .get_account(iban)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(iban.to_string()))
    }

    /// Open a new account. A missing initial balance means zero.
    #[instrument(skip(self))]
    pub async fn create_account(
        &self,
        initial_balance: Option<Cents>,
    ) -> Result<Account, LedgerError> {
        let initial_balance = initial_balance.unwrap_or(0);
        if initial_balance < 0 {
            return Err(LedgerError::validation("Initial balance cannot be negative."));
        }

        for _ in 0..MAX_IBAN_ATTEMPTS {
            let account = Account::new(initial_balance);
            if self.repo.insert_account(&account).await? {
                info!(
                    iban = %account.iban,
                    balance = %format_cents(account.balance),
                    "account created"
                );
                return Ok(account);
            }
        }

        Err(anyhow::anyhow!(
            "Could not allocate a unique iban after {} attempts",
            MAX_IBAN_ATTEMPTS
        )
        .into())
    }

    // ========================
    // Money movement
    // ========================

    /// Credit an account and record a DEPOSIT entry.
    #[instrument(skip(self))]
    pub async fn deposit(&self, iban: &str, amount: Cents) -> Result<Account, LedgerError> {
        validate_iban(iban)?;
        validate_amount(amount)?;

        let mut tx = self.repo.begin().await?;
        let account = match tx.credit(iban, amount).await? {
            Some(account) => account,
            None => return Err(credit_failure(&mut tx, iban).await),
        };

        tx.append(&mut Transaction::new(iban, amount, TransactionKind::Deposit))
            .await?;
        tx.commit().await?;

        info!(
            %iban,
            amount = %format_cents(amount),
            balance = %format_cents(account.balance),
            "deposit recorded"
        );
        Ok(account)
    }

    /// Debit an account and record a WITHDRAW entry.
    /// Fails without side effects if the balance does not cover `amount`.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, iban: &str, amount: Cents) -> Result<Account, LedgerError> {
        validate_iban(iban)?;
        validate_amount(amount)?;

        let mut tx = self.repo.begin().await?;
        let account = match tx.debit(iban, amount).await? {
            Some(account) => account,
            None => return Err(debit_failure(&mut tx, iban, amount).await),
        };

        tx.append(&mut Transaction::new(iban, amount, TransactionKind::Withdraw))
            .await?;
        tx.commit().await?;

        info!(
            %iban,
            amount = %format_cents(amount),
            balance = %format_cents(account.balance),
            "withdrawal recorded"
        );
        Ok(account)
    }

    /// Move money between two accounts. The debit, the credit and both
    /// ledger entries commit together or not at all.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from_iban: &str,
        to_iban: &str,
        amount: Cents,
    ) -> Result<TransferReceipt, LedgerError> {
        validate_iban(from_iban)?;
        validate_iban(to_iban)?;
        validate_amount(amount)?;
        if from_iban == to_iban {
            return Err(LedgerError::validation("Cannot transfer to the same account"));
        }

        let mut tx = self.repo.begin().await?;

        let from = match tx.debit(from_iban, amount).await? {
            Some(account) => account,
            None => {
                // A missing destination outranks insufficient funds
                if tx.get_account(from_iban).await?.is_some()
                    && tx.get_account(to_iban).await?.is_none()
                {
                    return Err(LedgerError::AccountNotFound(to_iban.to_string()));
                }
                return Err(debit_failure(&mut tx, from_iban, amount).await);
            }
        };

        let to = match tx.credit(to_iban, amount).await? {
            Some(account) => account,
            None => return Err(credit_failure(&mut tx, to_iban).await),
        };

        tx.append(&mut Transaction::new(from_iban, amount, TransactionKind::TransferOut))
            .await?;
        tx.append(&mut Transaction::new(to_iban, amount, TransactionKind::TransferIn))
            .await?;
        tx.commit().await?;

        info!(
            from = %from_iban,
            to = %to_iban,
            amount = %format_cents(amount),
            "transfer recorded"
        );
        Ok(TransferReceipt { from, to, amount })
    }

    // ========================
    // Statements
    // ========================

    /// All entries of an account, most recent first.
    pub async fn statement(&self, iban: &str) -> Result<Vec<Transaction>, LedgerError> {
        let account = self.get_account(iban).await?;
        Ok(self
            .repo
            .list_transactions_for_account(&account.iban)
            .await?)
    }

    /// Sum of all balances. Transfers never change it.
    pub async fn total_balance(&self) -> Result<Cents, LedgerError> {
        Ok(self.repo.total_balance().await?)
    }
}

fn validate_iban(iban: &str) -> Result<(), LedgerError> {
    if iban.trim().is_empty() {
        return Err(LedgerError::validation("Invalid input: iban is required"));
    }
    Ok(())
}

fn validate_amount(amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::validation("Invalid input: amount must be positive"));
    }
    Ok(())
}

/// Explain why a guarded credit matched no row.
async fn credit_failure(tx: &mut LedgerTx, iban: &str) -> LedgerError {
    match tx.get_account(iban).await {
        Ok(Some(_)) => LedgerError::validation("Invalid input: amount would overflow the balance"),
        Ok(None) => LedgerError::AccountNotFound(iban.to_string()),
        Err(err) => err.into(),
    }
}

/// Explain why a guarded debit matched no row.
async fn debit_failure(tx: &mut LedgerTx, iban: &str, amount: Cents) -> LedgerError {
    match tx.get_account(iban).await {
        Ok(Some(account)) => LedgerError::InsufficientFunds {
            iban: iban.to_string(),
            balance: account.balance,
            required: amount,
        },
        Ok(None) => LedgerError::AccountNotFound(iban.to_string()),
        Err(err) => err.into(),
    }
}
