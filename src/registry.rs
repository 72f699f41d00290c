// 2.0 registry.rs: durable keyed store of per-order trailing-stop state.
// entries are independently lockable so cycles over disjoint orders never
// contend; the per-entry mutex is the critical section for the rate gate.

use crate::types::{Bps, OracleRef, OrderId, Price, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// 2.1: the whole durable state surface for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    pub oracle_ref: OracleRef,
    pub initial_stop_price: Price,
    pub trailing_distance: Bps,
    pub current_stop_price: Price,
    pub configured_at: Timestamp,
    pub last_update_at: Timestamp,
    /// Minimum seconds between two successful updates.
    pub update_frequency: u64,
}

impl TrailingStopConfig {
    pub fn new(
        oracle_ref: OracleRef,
        initial_stop_price: Price,
        trailing_distance: Bps,
        update_frequency: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            oracle_ref,
            initial_stop_price,
            trailing_distance,
            current_stop_price: initial_stop_price,
            configured_at: now,
            last_update_at: now,
            update_frequency,
        }
    }

    /// Whether the rate gate admits an update at `now`. Boundary inclusive:
    /// an update exactly `update_frequency` seconds after the last one passes.
    pub fn is_due(&self, now: Timestamp) -> bool {
        now.secs_since(self.last_update_at) >= self.update_frequency as i64
    }
}

type Entry = Arc<Mutex<TrailingStopConfig>>;

/// Keyed store of trailing-stop records. A record exists iff the order has
/// been configured; absence is the only "not configured" sentinel.
#[derive(Debug, Default)]
pub struct TrailingStopRegistry {
    entries: DashMap<OrderId, Entry>,
}

// Entry mutexes guard plain assignments that cannot leave a record half
// written, so a poisoned lock still holds a consistent value.
pub(crate) fn lock_entry(entry: &Mutex<TrailingStopConfig>) -> MutexGuard<'_, TrailingStopConfig> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TrailingStopRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or fully replace the record for an order. Replacement happens
    /// under the same per-entry lock updates take, so a concurrent update
    /// never observes a torn record.
    pub fn upsert(&self, order_id: OrderId, config: TrailingStopConfig) {
        self.entries
            .entry(order_id)
            .and_modify(|slot| *lock_entry(slot) = config.clone())
            .or_insert_with(|| Arc::new(Mutex::new(config)));
    }

    /// Handle to an order's lockable record.
    pub fn get(&self, order_id: OrderId) -> Option<Entry> {
        self.entries.get(&order_id).map(|entry| Arc::clone(&entry))
    }

    /// Point-in-time copy of an order's record.
    pub fn snapshot(&self, order_id: OrderId) -> Option<TrailingStopConfig> {
        self.get(order_id).map(|entry| lock_entry(&entry).clone())
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.entries.contains_key(&order_id)
    }

    /// Prune a retired order (filled, cancelled, or expired). Retirement
    /// policy itself lives with the caller.
    pub fn remove(&self, order_id: OrderId) -> Option<TrailingStopConfig> {
        self.entries
            .remove(&order_id)
            .map(|(_, entry)| lock_entry(&entry).clone())
    }

    pub fn order_ids(&self) -> Vec<OrderId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
