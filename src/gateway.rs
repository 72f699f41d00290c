// 5.0 gateway.rs: execution handshake. once validate_trigger has produced a
// snapshot, the gateway pulls the maker's funds, grants the venue an exact
// allowance, runs the swap, enforces the minimum-output guarantee, and settles
// the counter-asset. any failure past the debit rolls back atomically.

use crate::auth::PauseSwitch;
use crate::engine::StopSnapshot;
use crate::events::{EventPayload, EventSink, ExecutionRejectedEvent, ExecutionSettledEvent};
use crate::ledger::{AssetLedger, LedgerError};
use crate::types::{ActorId, AssetId, OrderId, Timestamp, VenueRef};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    #[error("venue rejected swap: {reason}")]
    Rejected { reason: String },

    #[error("venue call timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub amount_in: Decimal,
    pub recipient: ActorId,
    pub payload: Vec<u8>,
}

/// The external system that performs the asset exchange. Implementations own
/// their transport and must bound the call with a timeout, surfacing overruns
/// as `Timeout`. Returns the amount of `token_out` produced.
pub trait SwapVenue: Send + Sync {
    fn venue_ref(&self) -> &VenueRef;

    fn swap(&self, request: &SwapRequest) -> Result<Decimal, VenueError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("engine is paused")]
    Paused,

    #[error("snapshot covers order {expected}, request names {got}")]
    SnapshotMismatch { expected: OrderId, got: OrderId },

    #[error("making amount must be positive")]
    InvalidAmount,

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("slippage exceeded: output {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: Decimal, actual: Decimal },

    #[error("swap failed: {reason}")]
    SwapFailed { reason: String },

    #[error("swap venue timed out")]
    ExecutionTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub order_id: OrderId,
    pub maker: ActorId,
    /// Where the counter-asset settles; usually the maker.
    pub receiver: ActorId,
    pub maker_asset: AssetId,
    pub taker_asset: AssetId,
    pub making_amount: Decimal,
    pub min_acceptable_output: Decimal,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub order_id: OrderId,
    pub making_amount: Decimal,
    pub actual_output: Decimal,
    pub settled_at: Timestamp,
}

pub struct ExecutionGateway {
    ledger: Arc<AssetLedger>,
    venue: Arc<dyn SwapVenue>,
    /// The gateway's own custody account; maker funds sit here between the
    /// debit and settlement so a rollback is a plain reverse transfer.
    custodian: ActorId,
    pause: Arc<PauseSwitch>,
    events: Arc<dyn EventSink>,
}

impl ExecutionGateway {
    pub fn new(
        ledger: Arc<AssetLedger>,
        venue: Arc<dyn SwapVenue>,
        custodian: ActorId,
        pause: Arc<PauseSwitch>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            ledger,
            venue,
            custodian,
            pause,
            events,
        }
    }

    /// Execute a triggered order. The `snapshot` parameter is the proof that
    /// `validate_trigger` passed; there is no other way to obtain one.
    pub fn execute(
        &self,
        snapshot: &StopSnapshot,
        request: &ExecutionRequest,
        now: Timestamp,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        if self.pause.is_paused() {
            return Err(ExecutionError::Paused);
        }
        if snapshot.order_id != request.order_id {
            return Err(ExecutionError::SnapshotMismatch {
                expected: snapshot.order_id,
                got: request.order_id,
            });
        }
        if request.making_amount <= Decimal::ZERO || request.min_acceptable_output <= Decimal::ZERO {
            return Err(ExecutionError::InvalidAmount);
        }

        // single debit into gateway custody
        self.ledger
            .debit(request.maker, &request.maker_asset, request.making_amount)?;
        self.ledger
            .credit(self.custodian, &request.maker_asset, request.making_amount)?;

        let venue_ref = self.venue.venue_ref().clone();
        self.ledger
            .approve_exact(&venue_ref, &request.maker_asset, request.making_amount);

        let swap = SwapRequest {
            token_in: request.maker_asset.clone(),
            token_out: request.taker_asset.clone(),
            amount_in: request.making_amount,
            recipient: request.receiver,
            payload: request.payload.clone(),
        };
        let outcome = self.venue.swap(&swap);

        // the grant covers exactly one swap attempt
        self.ledger.revoke_allowance(&venue_ref, &request.maker_asset);

        let actual_output = match outcome {
            Ok(output) => output,
            Err(VenueError::Rejected { reason }) => {
                self.rollback(request, now, &reason);
                return Err(ExecutionError::SwapFailed { reason });
            }
            Err(VenueError::Timeout) => {
                self.rollback(request, now, "venue timeout");
                return Err(ExecutionError::ExecutionTimeout);
            }
        };

        if actual_output < request.min_acceptable_output {
            self.rollback(request, now, "slippage exceeded");
            return Err(ExecutionError::SlippageExceeded {
                minimum: request.min_acceptable_output,
                actual: actual_output,
            });
        }

        // venue consumed the input; settle the counter-asset to the receiver
        self.ledger
            .debit(self.custodian, &request.maker_asset, request.making_amount)?;
        self.ledger
            .credit(request.receiver, &request.taker_asset, actual_output)?;

        debug!(order_id = %request.order_id, %actual_output, "execution settled");
        self.events.emit(
            now,
            EventPayload::ExecutionSettled(ExecutionSettledEvent {
                order_id: request.order_id,
                maker_asset: request.maker_asset.clone(),
                taker_asset: request.taker_asset.clone(),
                making_amount: request.making_amount,
                actual_output,
            }),
        );

        Ok(ExecutionReceipt {
            order_id: request.order_id,
            making_amount: request.making_amount,
            actual_output,
            settled_at: now,
        })
    }

    // reverse the custody transfer and leave an audit trail
    fn rollback(&self, request: &ExecutionRequest, now: Timestamp, reason: &str) {
        warn!(order_id = %request.order_id, reason, "execution rolled back");
        // the custodian holds exactly the debited amount, so these cannot fail
        let _ = self
            .ledger
            .debit(self.custodian, &request.maker_asset, request.making_amount);
        let _ = self
            .ledger
            .credit(request.maker, &request.maker_asset, request.making_amount);
        self.events.emit(
            now,
            EventPayload::ExecutionRejected(ExecutionRejectedEvent {
                order_id: request.order_id,
                reason: reason.to_string(),
            }),
        );
    }
}

/// Scripted venue for tests and simulations.
#[derive(Debug)]
pub struct MockVenue {
    venue_ref: VenueRef,
    mode: std::sync::Mutex<VenueMode>,
}

#[derive(Debug, Clone)]
pub enum VenueMode {
    /// Return this output amount.
    Quote(Decimal),
    Reject(String),
    Timeout,
}

impl MockVenue {
    pub fn new(name: impl Into<String>, mode: VenueMode) -> Self {
        Self {
            venue_ref: VenueRef::new(name),
            mode: std::sync::Mutex::new(mode),
        }
    }

    pub fn set_mode(&self, mode: VenueMode) {
        *self
            .mode
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = mode;
    }
}

impl SwapVenue for MockVenue {
    fn venue_ref(&self) -> &VenueRef {
        &self.venue_ref
    }

    fn swap(&self, _request: &SwapRequest) -> Result<Decimal, VenueError> {
        let mode = self
            .mode
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        match mode {
            VenueMode::Quote(output) => Ok(output),
            VenueMode::Reject(reason) => Err(VenueError::Rejected { reason }),
            VenueMode::Timeout => Err(VenueError::Timeout),
        }
    }
}
