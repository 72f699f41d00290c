// 4.0 engine.rs: the trailing-stop state machine. configure writes a fresh
// record, update ratchets the stop from the latest oracle price behind a hard
// rate gate, validate_trigger asserts the stop condition before any funds move.
//
// every operation is all-or-nothing: a rejected call leaves the registry
// byte-for-byte unchanged.

use crate::auth::PauseSwitch;
use crate::config::{EngineConfig, RatchetPolicy};
use crate::events::{
    EventPayload, EventSink, StopConfiguredEvent, StopUpdatedEvent, TriggerValidatedEvent,
};
use crate::price_feed::{PriceFeedError, PriceOracle, CANONICAL_DECIMALS};
use crate::registry::{lock_entry, TrailingStopConfig, TrailingStopRegistry};
use crate::types::{ActorId, Bps, OracleRef, OrderId, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    #[error("oracle reference must not be empty")]
    InvalidOracle,

    #[error("initial stop price must be positive")]
    InvalidStopPrice,

    #[error("trailing distance {bps} bps outside [{min}, {den})", den = BPS_DENOMINATOR)]
    InvalidTrailingDistance { bps: u32, min: u32 },

    #[error("order {0} has no trailing stop configured")]
    NotConfigured(OrderId),

    #[error("update too frequent: {elapsed}s since last update, {required}s required")]
    UpdateTooFrequent { elapsed: i64, required: u64 },

    #[error("stop not reached: observed {observed} above stop {stop}")]
    TriggerNotMet { observed: Price, stop: Price },

    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[from] PriceFeedError),

    #[error("engine is paused")]
    Paused,
}

/// Validated stop state returned by `validate_trigger`. Holding one is the
/// gateway's proof that the stop condition was checked for this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSnapshot {
    pub order_id: OrderId,
    pub stop_price: Price,
    pub trailing_distance: Bps,
    pub last_update_at: Timestamp,
}

/// Outcome of a successful `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopUpdate {
    pub order_id: OrderId,
    pub old_stop_price: Price,
    pub new_stop_price: Price,
    pub market_price: Price,
}

pub struct TrailingStopEngine {
    config: EngineConfig,
    registry: Arc<TrailingStopRegistry>,
    oracle: Arc<dyn PriceOracle>,
    pause: Arc<PauseSwitch>,
    events: Arc<dyn EventSink>,
}

impl TrailingStopEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<TrailingStopRegistry>,
        oracle: Arc<dyn PriceOracle>,
        pause: Arc<PauseSwitch>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            registry,
            oracle,
            pause,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Read-only view of an order's stop state.
    pub fn stop_state(&self, order_id: OrderId) -> Option<TrailingStopConfig> {
        self.registry.snapshot(order_id)
    }

    /// Configure (or fully reconfigure) a trailing stop for an order.
    /// Overwrite semantics: a re-call replaces the prior record wholesale.
    pub fn configure(
        &self,
        order_id: OrderId,
        oracle_ref: OracleRef,
        initial_stop_price: Decimal,
        trailing_distance_bps: u32,
        update_frequency: u64,
        now: Timestamp,
    ) -> Result<(), StopError> {
        if oracle_ref.is_empty() {
            return Err(StopError::InvalidOracle);
        }
        let initial_stop = Price::new(initial_stop_price).ok_or(StopError::InvalidStopPrice)?;
        let min = self.config.min_trailing_distance_bps;
        // a full-denominator distance would ratchet the stop to zero
        if trailing_distance_bps < min || trailing_distance_bps >= BPS_DENOMINATOR {
            return Err(StopError::InvalidTrailingDistance {
                bps: trailing_distance_bps,
                min,
            });
        }

        let distance = Bps::new(trailing_distance_bps);
        let record = TrailingStopConfig::new(
            oracle_ref.clone(),
            initial_stop,
            distance,
            update_frequency,
            now,
        );
        self.registry.upsert(order_id, record);

        debug!(order_id = %order_id, oracle = %oracle_ref, stop = %initial_stop, "trailing stop configured");
        self.events.emit(
            now,
            EventPayload::StopConfigured(StopConfiguredEvent {
                order_id,
                oracle_ref,
                initial_stop_price: initial_stop,
                trailing_distance: distance,
            }),
        );
        Ok(())
    }

    /// Recompute the stop from the latest oracle price. The read-check-write
    /// of the rate gate, the oracle read, and the stop write form one per-order
    /// critical section: two racing callers cannot both pass the gate.
    pub fn update(
        &self,
        order_id: OrderId,
        caller: ActorId,
        now: Timestamp,
    ) -> Result<StopUpdate, StopError> {
        if self.pause.is_paused() {
            return Err(StopError::Paused);
        }

        let entry = self
            .registry
            .get(order_id)
            .ok_or(StopError::NotConfigured(order_id))?;
        let mut record = lock_entry(&entry);

        if !record.is_due(now) {
            return Err(StopError::UpdateTooFrequent {
                elapsed: now.secs_since(record.last_update_at),
                required: record.update_frequency,
            });
        }

        let sample = self.oracle.latest_price(&record.oracle_ref)?;
        let age = sample.age_secs(now);
        if age > self.config.max_price_staleness_secs as i64 {
            return Err(StopError::OracleUnavailable(PriceFeedError::StalePrice {
                age_secs: age,
                max_age_secs: self.config.max_price_staleness_secs,
            }));
        }
        let market_price = sample.normalized()?;

        let candidate = ratchet_candidate(market_price, record.trailing_distance);
        let new_stop = match self.config.ratchet_policy {
            RatchetPolicy::MonotonicTighten => candidate.max(record.current_stop_price),
            RatchetPolicy::AlwaysRepeg => candidate,
        };

        let old_stop = record.current_stop_price;
        record.current_stop_price = new_stop;
        record.last_update_at = now;
        drop(record);

        debug!(order_id = %order_id, %old_stop, %new_stop, %market_price, "trailing stop updated");
        self.events.emit(
            now,
            EventPayload::StopUpdated(StopUpdatedEvent {
                order_id,
                old_stop_price: old_stop,
                new_stop_price: new_stop,
                market_price,
                caller,
            }),
        );

        Ok(StopUpdate {
            order_id,
            old_stop_price: old_stop,
            new_stop_price: new_stop,
            market_price,
        })
    }

    /// Assert the stop condition holds at fill time: for a sell-side trailing
    /// stop the observed price must be at or below the current stop. Read-only;
    /// the returned snapshot feeds downstream accounting.
    pub fn validate_trigger(
        &self,
        order_id: OrderId,
        observed_price: Price,
        now: Timestamp,
    ) -> Result<StopSnapshot, StopError> {
        let record = self
            .registry
            .snapshot(order_id)
            .ok_or(StopError::NotConfigured(order_id))?;

        if observed_price > record.current_stop_price {
            return Err(StopError::TriggerNotMet {
                observed: observed_price,
                stop: record.current_stop_price,
            });
        }

        self.events.emit(
            now,
            EventPayload::TriggerValidated(TriggerValidatedEvent {
                order_id,
                stop_price: record.current_stop_price,
                observed_price,
            }),
        );

        Ok(StopSnapshot {
            order_id,
            stop_price: record.current_stop_price,
            trailing_distance: record.trailing_distance,
            last_update_at: record.last_update_at,
        })
    }
}

/// `price - floor(price * bps / 10_000)`, floor taken on the canonical
/// fixed-point representation. A distance below the full denominator keeps
/// the candidate positive.
fn ratchet_candidate(price: Price, distance: Bps) -> Price {
    let trailing_amount = (price.value() * distance.as_fraction()).trunc_with_scale(CANONICAL_DECIMALS);
    Price::new_unchecked(price.value() - trailing_amount)
}
