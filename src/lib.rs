// trailstop-core: trailing-stop order engine.
// a keeper-driven check/trigger protocol ratchets a per-order stop price
// against an oracle feed and, once the stop is hit, releases the order for
// execution against a swap venue. all computation is deterministic: callers
// supply `now`, adapters own the I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: OrderId, OracleRef, Price, Bps, Timestamp
//   2.x  registry.rs: per-order trailing-stop records, per-key locking
//   3.x  scheduler.rs: keeper protocol: check_due / run_cycle
//   4.x  engine.rs: configure / update ratchet / validate_trigger
//   5.x  gateway.rs: execution handshake against the swap venue
//   6.x  auth.rs: pause switch + owner-gated admin surface
//   7.x  config.rs: engine settings, ratchet policy
//   9.x  price_feed.rs: oracle trait, normalization (mocked adapter included)
//   10.x ledger.rs: balance/allowance custody surface (mocked)
//   11.x events.rs: state transition events for audit

// core modules
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod types;

// execution modules
pub mod gateway;
pub mod ledger;

// integration modules
pub mod auth;
pub mod config;
pub mod events;
pub mod price_feed;

// re exports for convenience
pub use auth::{AdminError, AdminGate, PauseSwitch};
pub use config::{EngineConfig, RatchetPolicy};
pub use engine::{StopError, StopSnapshot, StopUpdate, TrailingStopEngine};
pub use events::{Event, EventCollector, EventId, EventPayload, EventSink};
pub use gateway::{
    ExecutionError, ExecutionGateway, ExecutionReceipt, ExecutionRequest, MockVenue, SwapRequest,
    SwapVenue, VenueError, VenueMode,
};
pub use ledger::{AssetLedger, LedgerError};
pub use price_feed::{MockOracle, PriceFeedError, PriceOracle, PriceSample, CANONICAL_DECIMALS};
pub use registry::{TrailingStopConfig, TrailingStopRegistry};
pub use scheduler::{AutomationScheduler, CycleOutcome, CycleStatus};
pub use types::{ActorId, AssetId, Bps, OracleRef, OrderId, Price, Timestamp, VenueRef};
