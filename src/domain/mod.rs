mod account;
mod money;
mod transaction;

pub use account::*;
pub use money::*;
pub use transaction::*;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time, truncated to the microsecond precision the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
