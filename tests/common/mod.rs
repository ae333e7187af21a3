// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use moneta::application::LedgerService;
use moneta::domain::{Account, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());
    let service = LedgerService::init(&db_url).await?;
    Ok((service, temp_dir))
}

/// Same as [`test_service`], shareable across spawned tasks
pub async fn shared_service() -> Result<(Arc<LedgerService>, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    Ok((Arc::new(service), temp_dir))
}

/// Test fixture: a pair of funded accounts
pub struct Pair {
    pub alice: Account,
    pub bob: Account,
}

impl Pair {
    pub async fn open(service: &LedgerService, alice: Cents, bob: Cents) -> Result<Self> {
        Ok(Self {
            alice: service.create_account(Some(alice)).await?,
            bob: service.create_account(Some(bob)).await?,
        })
    }
}

/// Current balance of an account
pub async fn balance(service: &LedgerService, iban: &str) -> Result<Cents> {
    Ok(service.get_account(iban).await?.balance)
}
