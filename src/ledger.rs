// 10.0 ledger.rs: MOCKED. custody surface the gateway moves funds through.
// balances and venue allowances per (owner, asset); no real token transfers.

use crate::types::{ActorId, AssetId, VenueRef};
use dashmap::DashMap;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("transfer amount must be positive")]
    InvalidAmount,
}

/// Per-(owner, asset) balance book plus exact-amount venue allowances.
/// Entry operations hold the shard lock for the whole read-modify-write, so
/// debits cannot race each other into a negative balance.
#[derive(Debug, Default)]
pub struct AssetLedger {
    balances: DashMap<(ActorId, AssetId), Decimal>,
    allowances: DashMap<(VenueRef, AssetId), Decimal>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            allowances: DashMap::new(),
        }
    }

    pub fn balance_of(&self, owner: ActorId, asset: &AssetId) -> Decimal {
        self.balances
            .get(&(owner, asset.clone()))
            .map(|balance| *balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn credit(&self, owner: ActorId, asset: &AssetId, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let mut balance = self
            .balances
            .entry((owner, asset.clone()))
            .or_insert(Decimal::ZERO);
        *balance += amount;
        Ok(())
    }

    pub fn debit(&self, owner: ActorId, asset: &AssetId, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let mut balance = self
            .balances
            .entry((owner, asset.clone()))
            .or_insert(Decimal::ZERO);
        if *balance < amount {
            let available = *balance;
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    /// Grant a venue exactly `amount` spending power for one swap. Overwrites
    /// any previous grant; the gateway revokes on every exit path.
    pub fn approve_exact(&self, venue: &VenueRef, asset: &AssetId, amount: Decimal) {
        self.allowances.insert((venue.clone(), asset.clone()), amount);
    }

    pub fn revoke_allowance(&self, venue: &VenueRef, asset: &AssetId) {
        self.allowances.remove(&(venue.clone(), asset.clone()));
    }

    pub fn allowance(&self, venue: &VenueRef, asset: &AssetId) -> Decimal {
        self.allowances
            .get(&(venue.clone(), asset.clone()))
            .map(|allowance| *allowance)
            .unwrap_or(Decimal::ZERO)
    }
}
