use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::domain::{Account, Cents, Transaction, TransactionKind};

use super::MIGRATION_001_INITIAL;

/// How long a writer waits for another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_CONNECTIONS: u32 = 8;

const ACCOUNT_COLUMNS: &str = "iban, balance_cents, created_at";
const TRANSACTION_COLUMNS: &str = "sequence, id, account_id, amount_cents, kind, created_at";

/// Timestamps are stored as fixed-width RFC 3339 strings so that comparing
/// them as text orders them chronologically.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp: {}", raw))?
        .with_timezone(&Utc))
}

/// Repository for persisting and querying accounts and their transactions.
///
/// Reads go straight to the pool. Anything that moves money goes through a
/// [`LedgerTx`] obtained from [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {}", database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Close every pooled connection. Pending checkouts finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Start a unit of work. Dropping it without [`LedgerTx::commit`]
    /// rolls every write back.
    pub async fn begin(&self) -> Result<LedgerTx> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(LedgerTx { tx })
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account. Returns false if the iban is already taken.
    pub async fn insert_account(&self, account: &Account) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (iban, balance_cents, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (iban) DO NOTHING
            "#,
        )
        .bind(&account.iban)
        .bind(account.balance)
        .bind(encode_timestamp(account.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get an account by iban.
    pub async fn get_account(&self, iban: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE iban = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(iban)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// List all accounts, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY created_at, iban",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }

    // ========================
    // Transaction operations
    // ========================

    /// List an account's transactions, most recent first.
    pub async fn list_transactions_for_account(&self, iban: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE account_id = ?
            ORDER BY created_at DESC, sequence DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(iban)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Total money held across all accounts.
    pub async fn total_balance(&self) -> Result<Cents> {
        let row = sqlx::query("SELECT COALESCE(SUM(balance_cents), 0) AS total FROM accounts")
            .fetch_one(&self.pool)
            .await
            .context("Failed to sum balances")?;

        Ok(row.get("total"))
    }
}

/// A single store transaction spanning every write of one ledger operation.
///
/// The first statement issued through a `LedgerTx` must be a write
/// ([`credit`](Self::credit) or [`debit`](Self::debit)) so that SQLite takes
/// the write lock before anything is read; later reads then observe a
/// balance no concurrent writer can change.
pub struct LedgerTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl LedgerTx {
    /// Add `amount` to an account's balance.
    /// Returns `None` if the account does not exist or the new balance would
    /// not fit in an `i64`.
    pub async fn credit(&mut self, iban: &str, amount: Cents) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE iban = ? AND balance_cents <= ?
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(amount)
        .bind(iban)
        .bind(Cents::MAX - amount)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to credit account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Subtract `amount` from an account's balance, but only if the balance
    /// covers it. The check and the write are one statement, so no other
    /// writer can slip in between them.
    /// Returns `None` if the account does not exist or cannot cover `amount`.
    pub async fn debit(&mut self, iban: &str, amount: Cents) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE iban = ? AND balance_cents >= ?
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(amount)
        .bind(iban)
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to debit account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Get an account as seen from inside this transaction.
    pub async fn get_account(&mut self, iban: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE iban = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(iban)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Append a ledger entry. Assigns the store sequence number.
    pub async fn append(&mut self, transaction: &mut Transaction) -> Result<()> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, amount_cents, kind, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING sequence
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(&transaction.account_id)
        .bind(transaction.amount)
        .bind(transaction.kind.as_str())
        .bind(encode_timestamp(transaction.created_at))
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to save transaction")?;

        transaction.sequence = row.get("sequence");
        Ok(())
    }

    /// Make every write of this unit visible at once.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        iban: row.get("iban"),
        balance: row.get("balance_cents"),
        created_at: decode_timestamp(&created_at_str)?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let id_str: String = row.get("id");
    let kind_str: String = row.get("kind");
    let created_at_str: String = row.get("created_at");

    Ok(Transaction {
        id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
        sequence: row.get("sequence"),
        account_id: row.get("account_id"),
        amount: row.get("amount_cents"),
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
        created_at: decode_timestamp(&created_at_str)?,
    })
}
