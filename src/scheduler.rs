// 3.0 scheduler.rs: the keeper-facing automation protocol. check_due is the
// cheap read-only probe an off-chain poller can hit arbitrarily often;
// run_cycle performs the mutating pass. one failing feed never aborts the
// batch, and back-to-back cycles inside one frequency window are no-ops by
// virtue of the engine's own rate gate.

use crate::engine::{StopError, TrailingStopEngine};
use crate::types::{ActorId, OrderId, Price, Timestamp};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    Updated {
        old_stop_price: Price,
        new_stop_price: Price,
    },
    Failed(StopError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub order_id: OrderId,
    pub status: CycleStatus,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CycleStatus::Updated { .. })
    }
}

/// Stateless across cycles: the registry is the only durable state. The halt
/// flag is the cooperative cancellation point between per-order units.
pub struct AutomationScheduler {
    engine: Arc<TrailingStopEngine>,
    keeper: ActorId,
    halted: AtomicBool,
}

impl AutomationScheduler {
    pub fn new(engine: Arc<TrailingStopEngine>, keeper: ActorId) -> Self {
        Self {
            engine,
            keeper,
            halted: AtomicBool::new(false),
        }
    }

    pub fn keeper(&self) -> ActorId {
        self.keeper
    }

    /// Stop scheduling further per-order units. Updates already completed in
    /// an in-flight cycle stand.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn clear_halt(&self) {
        self.halted.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// The subset of `order_ids` that are configured and whose rate gate
    /// admits an update at `now`. Pure read; duplicates in the input are
    /// collapsed. Empty input is an empty result, not an error.
    pub fn check_due(&self, order_ids: &[OrderId], now: Timestamp) -> Vec<OrderId> {
        let mut seen = HashSet::new();
        order_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter(|id| {
                self.engine
                    .stop_state(**id)
                    .is_some_and(|state| state.is_due(now))
            })
            .copied()
            .collect()
    }

    /// One polling cycle: update every due order, isolating per-order
    /// failures into the returned summary instead of aborting the batch.
    pub fn run_cycle(&self, order_ids: &[OrderId], now: Timestamp) -> Vec<CycleOutcome> {
        let due = self.check_due(order_ids, now);
        let mut outcomes = Vec::with_capacity(due.len());

        for order_id in due {
            if self.is_halted() {
                debug!(processed = outcomes.len(), "cycle halted");
                break;
            }

            let status = match self.engine.update(order_id, self.keeper, now) {
                Ok(update) => CycleStatus::Updated {
                    old_stop_price: update.old_stop_price,
                    new_stop_price: update.new_stop_price,
                },
                Err(error) => {
                    warn!(order_id = %order_id, %error, "cycle update failed");
                    CycleStatus::Failed(error)
                }
            };
            outcomes.push(CycleOutcome { order_id, status });
        }

        debug!(
            total = outcomes.len(),
            updated = outcomes.iter().filter(|o| o.is_success()).count(),
            "cycle complete"
        );
        outcomes
    }
}
