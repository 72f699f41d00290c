// 11.0: every state change produces an event. used for audit trails and for
// notifying external systems. the EventPayload enum lists all event types.

use crate::types::{ActorId, AssetId, Bps, OracleRef, OrderId, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Stop lifecycle events
    StopConfigured(StopConfiguredEvent),
    StopUpdated(StopUpdatedEvent),
    TriggerValidated(TriggerValidatedEvent),

    // Execution events
    ExecutionSettled(ExecutionSettledEvent),
    ExecutionRejected(ExecutionRejectedEvent),

    // Administrative events
    EnginePaused(EnginePausedEvent),
    EngineResumed(EngineResumedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopConfiguredEvent {
    pub order_id: OrderId,
    pub oracle_ref: OracleRef,
    pub initial_stop_price: Price,
    pub trailing_distance: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopUpdatedEvent {
    pub order_id: OrderId,
    pub old_stop_price: Price,
    pub new_stop_price: Price,
    pub market_price: Price,
    pub caller: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerValidatedEvent {
    pub order_id: OrderId,
    pub stop_price: Price,
    pub observed_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettledEvent {
    pub order_id: OrderId,
    pub maker_asset: AssetId,
    pub taker_asset: AssetId,
    pub making_amount: Decimal,
    pub actual_output: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRejectedEvent {
    pub order_id: OrderId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginePausedEvent {
    pub by: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResumedEvent {
    pub by: ActorId,
}

// Sinks take &self: the engine, gateway, and scheduler all emit concurrently.
pub trait EventSink: Send + Sync {
    fn emit(&self, at: Timestamp, payload: EventPayload);
}

#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<Event>>,
    next_id: AtomicU64,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for EventCollector {
    fn emit(&self, at: Timestamp, payload: EventPayload) {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Event {
                id,
                timestamp: at,
                payload,
            });
    }
}
