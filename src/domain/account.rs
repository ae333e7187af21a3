use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Cents, as_decimal, now};

/// Prefix of every locally generated account identifier.
pub const IBAN_PREFIX: &str = "IBAN-";

/// Number of characters taken from the UUID after the prefix.
const IBAN_SUFFIX_LEN: usize = 8;

/// Generate a fresh account identifier: `IBAN-` followed by the first eight
/// characters of a random v4 UUID, uppercased.
///
/// Not a real-world IBAN; it only has to be unique within this ledger.
pub fn generate_iban() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}{}", IBAN_PREFIX, uuid[..IBAN_SUFFIX_LEN].to_uppercase())
}

/// Returns true if `iban` has the shape produced by [`generate_iban`].
pub fn is_well_formed_iban(iban: &str) -> bool {
    iban.strip_prefix(IBAN_PREFIX).is_some_and(|suffix| {
        suffix.len() == IBAN_SUFFIX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub iban: String,
    /// Balance in cents; never negative
    #[serde(with = "as_decimal")]
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(initial_balance: Cents) -> Self {
        Self {
            iban: generate_iban(),
            balance: initial_balance,
            created_at: now(),
        }
    }
}
