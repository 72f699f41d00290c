// 6.0 auth.rs: administrative surface. the pause switch is the circuit
// breaker the engine and gateway consult; AdminGate is the ownership check
// wrapped around the mutating admin calls, kept outside the engine core so
// the core is testable without an authorization subsystem.

use crate::engine::{StopError, TrailingStopEngine};
use crate::events::{EnginePausedEvent, EngineResumedEvent, EventPayload, EventSink};
use crate::types::{ActorId, OracleRef, OrderId, Timestamp};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Global administrative circuit breaker. While set, `update` and `execute`
/// fail fast with `Paused` rather than queuing.
#[derive(Debug, Default)]
pub struct PauseSwitch {
    paused: AtomicBool,
}

impl PauseSwitch {
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("actor {0} is not the configured owner")]
    Unauthorized(ActorId),

    #[error(transparent)]
    Stop(#[from] StopError),
}

/// Owner-gated wrapper over the administrative calls: pause, unpause, and
/// stop configuration.
pub struct AdminGate {
    owner: ActorId,
    engine: Arc<TrailingStopEngine>,
    pause: Arc<PauseSwitch>,
    events: Arc<dyn EventSink>,
}

impl AdminGate {
    pub fn new(
        owner: ActorId,
        engine: Arc<TrailingStopEngine>,
        pause: Arc<PauseSwitch>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            owner,
            engine,
            pause,
            events,
        }
    }

    fn ensure_owner(&self, caller: ActorId) -> Result<(), AdminError> {
        if caller != self.owner {
            return Err(AdminError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn pause(&self, caller: ActorId, now: Timestamp) -> Result<(), AdminError> {
        self.ensure_owner(caller)?;
        self.pause.pause();
        info!(by = %caller, "engine paused");
        self.events
            .emit(now, EventPayload::EnginePaused(EnginePausedEvent { by: caller }));
        Ok(())
    }

    pub fn unpause(&self, caller: ActorId, now: Timestamp) -> Result<(), AdminError> {
        self.ensure_owner(caller)?;
        self.pause.resume();
        info!(by = %caller, "engine resumed");
        self.events
            .emit(now, EventPayload::EngineResumed(EngineResumedEvent { by: caller }));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn configure(
        &self,
        caller: ActorId,
        order_id: OrderId,
        oracle_ref: OracleRef,
        initial_stop_price: Decimal,
        trailing_distance_bps: u32,
        update_frequency: u64,
        now: Timestamp,
    ) -> Result<(), AdminError> {
        self.ensure_owner(caller)?;
        self.engine
            .configure(
                order_id,
                oracle_ref,
                initial_stop_price,
                trailing_distance_bps,
                update_frequency,
                now,
            )
            .map_err(AdminError::from)
    }
}
