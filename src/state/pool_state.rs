//! Shared break-time pool

use serde::{Deserialize, Serialize};

/// The global break bank, in seconds.
///
/// The balance is signed: a negative value means the day is overdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolState {
    pub balance: i64,
}

impl PoolState {
    /// Open a pool holding `allowance` seconds
    pub fn opening(allowance: u64) -> Self {
        let mut pool = Self::default();
        pool.credit(allowance);
        pool
    }

    /// Remove `n` seconds from the pool
    pub fn debit(&mut self, n: u64) {
        self.balance = self.balance.saturating_sub_unsigned(n);
    }

    /// Add `n` seconds to the pool. Only used when opening a new day.
    pub fn credit(&mut self, n: u64) {
        self.balance = self.balance.saturating_add_unsigned(n);
    }

    pub fn is_overdrawn(&self) -> bool {
        self.balance < 0
    }
}
